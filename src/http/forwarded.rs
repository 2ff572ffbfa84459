//! Host-forwarding transport for realms reached through an internal address.
//!
//! The multi-tenant identity provider selects a realm from the externally requested host. When
//! the service reaches it through an internal address instead, the original host travels in a
//! `Forwarded` header so the provider can still apply per-host logic.

// std
use std::fmt::{Debug, Formatter, Result as FmtResult};
// crates.io
use http::{
	HeaderName, HeaderValue, Request, Uri,
	uri::{Authority, PathAndQuery, Scheme},
};
use url::Url;
// self
use crate::{
	_prelude::*,
	http::transport::{HttpTransport, TransportFuture},
	security,
};

/// `Forwarded` header name (RFC 7239).
pub const FORWARDED: HeaderName = HeaderName::from_static("forwarded");

/// Rewrites requests aimed at one external host so they reach an internal address instead.
///
/// Requests for any other host pass through untouched.
#[derive(Clone)]
pub struct ForwardingTransport {
	inner: Arc<dyn HttpTransport>,
	external_authority: String,
	internal_scheme: Scheme,
	internal_authority: Authority,
	forwarded: HeaderValue,
}
impl ForwardingTransport {
	/// Wrap `inner`, forwarding requests for `external` to `internal`.
	pub fn new(inner: Arc<dyn HttpTransport>, internal: &Url, external: &Url) -> Result<Self> {
		let external_authority = security::canonical_authority(external).ok_or_else(|| {
			Error::config("base_uri", format!("URL {external} must include a host component."))
		})?;
		let internal_authority = security::canonical_authority(internal).ok_or_else(|| {
			Error::config("internal_uri", format!("URL {internal} must include a host component."))
		})?;
		let internal_scheme = Scheme::try_from(internal.scheme()).map_err(|err| {
			Error::config("internal_uri", format!("Unsupported scheme {}: {err}.", internal.scheme()))
		})?;
		let internal_authority = Authority::try_from(internal_authority.as_str()).map_err(|err| {
			Error::config("internal_uri", format!("Invalid authority {internal_authority}: {err}."))
		})?;
		let forwarded = HeaderValue::try_from(format!(
			"host={external_authority};proto={}",
			external.scheme()
		))
		.map_err(|err| Error::config("base_uri", format!("Invalid forwarded host: {err}.")))?;

		Ok(Self { inner, external_authority, internal_scheme, internal_authority, forwarded })
	}

	/// Transport used to reach the realm at `external`.
	///
	/// Without an internal address the inner transport is returned as-is.
	pub fn for_realm(
		inner: Arc<dyn HttpTransport>,
		internal: Option<&Url>,
		external: &Url,
	) -> Result<Arc<dyn HttpTransport>> {
		match internal {
			Some(internal) => Ok(Arc::new(Self::new(inner, internal, external)?)),
			None => Ok(inner),
		}
	}

	/// Whether requests to `uri` are rewritten by this transport.
	pub fn matches(&self, uri: &Uri) -> bool {
		let Some(host) = uri.host().and_then(security::canonicalize_dns_name) else {
			return false;
		};
		let default_port = match uri.scheme_str() {
			Some("https") => Some(443),
			Some("http") => Some(80),
			_ => None,
		};
		let authority = match uri.port_u16() {
			Some(port) if Some(port) != default_port => format!("{host}:{port}"),
			_ => host,
		};

		authority == self.external_authority
	}

	fn rewrite(&self, mut request: Request<Vec<u8>>) -> Result<Request<Vec<u8>>> {
		let mut parts = request.uri().clone().into_parts();

		parts.scheme = Some(self.internal_scheme.clone());
		parts.authority = Some(self.internal_authority.clone());

		if parts.path_and_query.is_none() {
			parts.path_and_query = Some(PathAndQuery::from_static("/"));
		}

		*request.uri_mut() = Uri::from_parts(parts)
			.map_err(|err| Error::config("internal_uri", format!("Cannot rewrite URI: {err}.")))?;

		request.headers_mut().insert(FORWARDED, self.forwarded.clone());

		Ok(request)
	}
}
impl Debug for ForwardingTransport {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("ForwardingTransport")
			.field("external", &self.external_authority)
			.field("internal", &format_args!("{}://{}", self.internal_scheme, self.internal_authority))
			.finish()
	}
}
impl HttpTransport for ForwardingTransport {
	fn execute(&self, request: Request<Vec<u8>>) -> TransportFuture<'_> {
		if !self.matches(request.uri()) {
			return self.inner.execute(request);
		}

		let original = request.uri().to_string();

		match self.rewrite(request) {
			Ok(request) => {
				tracing::trace!(%original, rewritten = %request.uri(), "forwarding request to internal address");

				self.inner.execute(request)
			},
			Err(err) => Box::pin(async move { Err(err) }),
		}
	}
}

//! Issuer normalisation and issuer-to-verifier-cache resolution.
//!
//! Unlike realm routing, issuer resolution refuses unknown input: the issuer string is taken from
//! a caller-supplied token and must never be coerced to a default realm.

// std
use std::collections::HashMap;
// crates.io
use url::Url;
// self
use crate::{
	_prelude::*,
	cache::verifier::VerifierCache,
	config::VerifierSettings,
	http::{forwarded::ForwardingTransport, transport::HttpTransport},
	router::RealmRouter,
};

/// Canonical `scheme://host[:port]` of any URI, lower-cased, with path and query dropped.
///
/// Input that does not parse as an absolute URL is returned trimmed and lower-cased; it will
/// simply not match any configured issuer.
pub fn issuer_of(uri: &str) -> String {
	let trimmed = uri.trim();

	match Url::parse(trimmed) {
		Ok(url) if url.has_host() => {
			let host = url.host_str().unwrap_or_default().trim_end_matches('.');

			match url.port() {
				Some(port) => format!("{}://{host}:{port}", url.scheme()).to_ascii_lowercase(),
				None => format!("{}://{host}", url.scheme()).to_ascii_lowercase(),
			}
		},
		_ => trimmed.to_ascii_lowercase(),
	}
}

/// Resolves issuers to the verifier cache of the identity provider that minted them.
#[derive(Debug)]
pub struct IssuerResolver {
	caches: HashMap<String, Arc<VerifierCache>>,
}
impl IssuerResolver {
	/// Build one verifier cache per distinct base URI known to `router`.
	///
	/// When `internal_uri` is set, each cache reaches its realm through a [`ForwardingTransport`].
	pub fn from_router(
		router: &RealmRouter,
		transport: Arc<dyn HttpTransport>,
		internal_uri: Option<&Url>,
		settings: &VerifierSettings,
		max_response_bytes: u64,
	) -> Result<Self> {
		settings.validate()?;

		let mut caches = HashMap::new();

		for base_uri in router.all_base_uris() {
			let routed = ForwardingTransport::for_realm(transport.clone(), internal_uri, &base_uri)?;
			let cache = VerifierCache::new(
				base_uri.clone(),
				routed,
				settings.clone(),
				max_response_bytes,
			);

			caches.entry(issuer_of(base_uri.as_str())).or_insert_with(|| Arc::new(cache));
		}

		tracing::debug!(issuers = ?caches.keys().collect::<Vec<_>>(), "issuer resolver ready");

		Ok(Self { caches })
	}

	/// Verifier cache for the issuer carried by `issuer` (any URI under it is accepted).
	pub fn resolve_verifier(&self, issuer: &str) -> Result<&Arc<VerifierCache>> {
		let key = issuer_of(issuer);

		self.caches.get(&key).ok_or(Error::UnknownIssuer { issuer: key })
	}

	/// Known issuer keys.
	pub fn issuers(&self) -> impl Iterator<Item = &str> {
		self.caches.keys().map(String::as_str)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::http::transport::ReqwestTransport;

	#[test]
	fn issuer_ignores_case_and_path() {
		assert_eq!(
			issuer_of("https://EU.EXAMPLE.COM/realms/x"),
			issuer_of("https://eu.example.com/anything")
		);
		assert_eq!(issuer_of("https://eu.example.com/auth/realms/x?q=1"), "https://eu.example.com");
		assert_eq!(issuer_of("http://localhost:8080/auth"), "http://localhost:8080");
		assert_eq!(issuer_of("https://eu.example.com:443/"), "https://eu.example.com");
		assert_eq!(issuer_of(" Not-A-Url "), "not-a-url");
	}

	#[test]
	fn unknown_issuers_are_rejected() {
		let router = RealmRouter::new(
			[
				("eu", "https://eu.example.com"),
				("ch", "https://eu.example.com"),
				("us", "https://us.example.com"),
			],
			"eu",
		)
		.expect("router");
		let transport: Arc<dyn HttpTransport> =
			Arc::new(ReqwestTransport::new(Duration::from_secs(5)).expect("transport"));
		let resolver = IssuerResolver::from_router(
			&router,
			transport,
			None,
			&VerifierSettings::default(),
			1024,
		)
		.expect("resolver");

		assert_eq!(resolver.issuers().count(), 2);

		let eu = resolver.resolve_verifier("https://EU.example.com/auth/realms/r1").expect("eu");
		let eu_again = resolver.resolve_verifier("https://eu.example.com").expect("eu");

		assert!(Arc::ptr_eq(eu, eu_again));
		assert!(matches!(
			resolver.resolve_verifier("https://evil.example.com/auth/realms/r1"),
			Err(Error::UnknownIssuer { .. })
		));
	}
}

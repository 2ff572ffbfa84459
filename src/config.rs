//! Configuration inputs for routers, verifier caches, and transports.
//!
//! Every value can be supplied through `serde`; omitted fields fall back to the constants below.

// std
use std::collections::BTreeMap;
// crates.io
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use url::Url;
// self
use crate::{_prelude::*, router::RealmRouter, security};

/// Key assigned to the default realm when none is configured.
pub const DEFAULT_REALM_KEY: &str = "default";
/// Default per-request HTTP timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default lifetime of a cached verifier.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(15 * 60);
/// Default window during which verification failures do not evict a verifier.
pub const DEFAULT_ERROR_TOLERANCE: Duration = Duration::from_secs(60);
/// Default clock skew tolerated when checking `exp`/`nbf`.
pub const DEFAULT_LEEWAY: Duration = Duration::from_secs(60);
/// Default size guard (1 MiB) for discovery, JWKS, and token bodies.
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 1_048_576;

/// Settings shared by every verifier cache.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerifierSettings {
	/// Lifetime of a cached verifier before discovery runs again.
	#[serde(default = "default_cache_ttl")]
	pub cache_ttl: Duration,
	/// Failures observed within this window after construction never evict the verifier.
	#[serde(default = "default_error_tolerance")]
	pub error_tolerance: Duration,
	/// Signature algorithms accepted in token headers.
	#[serde(default = "default_allowed_algorithms")]
	pub allowed_algorithms: Vec<Algorithm>,
	/// Clock skew tolerated for time-based claims.
	#[serde(default = "default_leeway")]
	pub leeway: Duration,
}
impl VerifierSettings {
	/// Validate invariants for verifier settings.
	pub fn validate(&self) -> Result<()> {
		if self.cache_ttl.is_zero() {
			return Err(Error::config("verifier.cache_ttl", "Must be greater than zero."));
		}
		if self.allowed_algorithms.is_empty() {
			return Err(Error::config(
				"verifier.allowed_algorithms",
				"At least one algorithm must be allowed.",
			));
		}

		Ok(())
	}
}
impl Default for VerifierSettings {
	fn default() -> Self {
		Self {
			cache_ttl: DEFAULT_CACHE_TTL,
			error_tolerance: DEFAULT_ERROR_TOLERANCE,
			allowed_algorithms: default_allowed_algorithms(),
			leeway: DEFAULT_LEEWAY,
		}
	}
}

/// Top-level configuration describing where each realm lives and how to reach it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RealmConfig {
	/// Internally routable address used in place of every public realm host.
	#[serde(default)]
	pub internal_uri: Option<Url>,
	/// Realm key to public base URI.
	pub realm_public_uri_map: BTreeMap<String, String>,
	/// Key of the realm used when a lookup does not match.
	#[serde(default = "default_realm_key")]
	pub default_key: String,
	/// Timeout applied to each HTTP request.
	#[serde(default = "default_timeout")]
	pub timeout: Duration,
	/// Whether public base URIs must use HTTPS.
	#[serde(default = "default_true")]
	pub require_https: bool,
	/// Maximum accepted body size for discovery, JWKS, and token responses.
	#[serde(default = "default_max_response_bytes")]
	pub max_response_bytes: u64,
	/// Verifier cache policy.
	#[serde(default)]
	pub verifier: VerifierSettings,
}
impl RealmConfig {
	/// Build a configuration from explicit realm entries.
	pub fn new<I, K, V>(entries: I, default_key: impl Into<String>) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			internal_uri: None,
			realm_public_uri_map: entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
			default_key: default_key.into(),
			timeout: DEFAULT_TIMEOUT,
			require_https: true,
			max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
			verifier: VerifierSettings::default(),
		}
	}

	/// Import a flat list of addresses: the first one becomes [`DEFAULT_REALM_KEY`] and the
	/// others `entry-1`, `entry-2`, and so on.
	pub fn from_uris<I, S>(uris: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let entries = uris.into_iter().enumerate().map(|(idx, uri)| {
			let key = if idx == 0 { DEFAULT_REALM_KEY.to_owned() } else { format!("entry-{idx}") };

			(key, uri.into())
		});

		Self::new(entries, DEFAULT_REALM_KEY)
	}

	/// Route every public host through `internal_uri`.
	pub fn with_internal_uri(mut self, internal_uri: Url) -> Self {
		self.internal_uri = Some(internal_uri);

		self
	}

	/// Set HTTPS requirement to the desired value.
	pub fn with_require_https(mut self, require_https: bool) -> Self {
		self.require_https = require_https;

		self
	}

	/// Replace the verifier cache policy.
	pub fn with_verifier(mut self, verifier: VerifierSettings) -> Self {
		self.verifier = verifier;

		self
	}

	/// Validate the configuration and build its router.
	pub fn router(&self) -> Result<RealmRouter> {
		self.validate()?;

		let router = RealmRouter::new(self.realm_public_uri_map.iter(), &self.default_key)?;

		if self.require_https {
			for base_uri in router.all_base_uris() {
				security::enforce_https(&base_uri)?;
			}
		}

		Ok(router)
	}

	/// Validate the configuration against the documented constraints.
	pub fn validate(&self) -> Result<()> {
		if self.timeout.is_zero() {
			return Err(Error::config("timeout", "Must be greater than zero."));
		}
		if self.max_response_bytes == 0 {
			return Err(Error::config("max_response_bytes", "Must be greater than zero."));
		}
		if let Some(internal) = &self.internal_uri
			&& internal.host_str().is_none()
		{
			return Err(Error::config("internal_uri", "Must include a host component."));
		}

		self.verifier.validate()
	}
}

fn default_realm_key() -> String {
	DEFAULT_REALM_KEY.to_owned()
}

fn default_timeout() -> Duration {
	DEFAULT_TIMEOUT
}

fn default_true() -> bool {
	true
}

fn default_max_response_bytes() -> u64 {
	DEFAULT_MAX_RESPONSE_BYTES
}

fn default_cache_ttl() -> Duration {
	DEFAULT_CACHE_TTL
}

fn default_error_tolerance() -> Duration {
	DEFAULT_ERROR_TOLERANCE
}

fn default_leeway() -> Duration {
	DEFAULT_LEEWAY
}

fn default_allowed_algorithms() -> Vec<Algorithm> {
	vec![
		Algorithm::RS256,
		Algorithm::RS384,
		Algorithm::RS512,
		Algorithm::PS256,
		Algorithm::PS384,
		Algorithm::PS512,
		Algorithm::ES256,
		Algorithm::ES384,
	]
}

//! Crate-wide error types and `Result` alias.

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the realm credential subsystem.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Http(#[from] http::Error),
	#[error(transparent)]
	Jsonwebtoken(#[from] jsonwebtoken::errors::Error),
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	Serde(#[from] serde_json::Error),
	#[error(transparent)]
	Url(#[from] url::ParseError),

	#[error("Invalid configuration for {field}: {reason}")]
	Config { field: &'static str, reason: String },
	#[error("Discovery failed for realm '{realm}': {reason}")]
	Discovery { realm: String, reason: String },
	#[error("Upstream HTTP status {status} from {url}: {body:?}")]
	HttpStatus { status: http::StatusCode, url: url::Url, body: Option<String> },
	#[error("Metrics error: {0}")]
	Metrics(String),
	#[error("Security violation: {0}")]
	Security(String),
	#[error("Deadline exceeded before the operation completed.")]
	Timeout,
	#[error("Token endpoint for realm '{realm}' failed: {reason}")]
	TokenEndpoint { realm: String, status: Option<http::StatusCode>, reason: String },
	#[error("Unknown issuer '{issuer}'.")]
	UnknownIssuer { issuer: String },
	#[error("No token source is configured for realm '{realm}'.")]
	UnknownRealm { realm: String },
	#[error("Token verification failed for realm '{realm}': {reason}")]
	Verification { realm: String, reason: String },
}
impl Error {
	pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
		Self::Config { field, reason: reason.into() }
	}

	/// Whether the error came from a deadline expiring.
	pub fn is_timeout(&self) -> bool {
		match self {
			Self::Timeout => true,
			Self::Reqwest(err) => err.is_timeout(),
			_ => false,
		}
	}
}

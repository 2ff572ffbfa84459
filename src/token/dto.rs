//! Token endpoint payloads.

// std
use std::fmt::{Debug, Formatter, Result as FmtResult};
// crates.io
use serde::Deserialize;
// self
use crate::token::secret::Secret;

/// Successful token endpoint response.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
	#[allow(missing_docs)]
	pub access_token: Secret,
	/// Access token lifetime in seconds.
	#[serde(default)]
	pub expires_in: Option<u64>,
	#[allow(missing_docs)]
	#[serde(default)]
	pub refresh_token: Option<Secret>,
	/// Refresh token lifetime in seconds; `0` means it does not expire on a timer.
	#[serde(default)]
	pub refresh_expires_in: Option<u64>,
	#[allow(missing_docs)]
	#[serde(default)]
	pub token_type: Option<String>,
	#[allow(missing_docs)]
	#[serde(default)]
	pub scope: Option<String>,
	#[allow(missing_docs)]
	#[serde(default)]
	pub session_state: Option<String>,
	#[allow(missing_docs)]
	#[serde(default, rename = "not-before-policy")]
	pub not_before_policy: Option<i64>,
}
impl Debug for TokenResponse {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("TokenResponse")
			.field("access_token", &self.access_token)
			.field("expires_in", &self.expires_in)
			.field("refresh_token", &self.refresh_token)
			.field("refresh_expires_in", &self.refresh_expires_in)
			.field("token_type", &self.token_type)
			.field("scope", &self.scope)
			.finish_non_exhaustive()
	}
}

/// OAuth 2.0 error body returned by the token endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenErrorResponse {
	#[allow(missing_docs)]
	pub error: String,
	#[allow(missing_docs)]
	#[serde(default)]
	pub error_description: Option<String>,
}
impl TokenErrorResponse {
	/// Human-readable reason combining the error code and its description.
	pub fn reason(&self) -> String {
		match self.error_description.as_deref() {
			Some(description) if !description.is_empty() => format!("{}: {description}", self.error),
			_ => self.error.clone(),
		}
	}
}

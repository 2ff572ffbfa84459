//! Security utilities covering HTTPS enforcement and authority canonicalisation.
//!
//! # Threat Model
//! Realm addresses come from trusted configuration, but the hosts compared against them at
//! request time (forwarding decisions, issuer lookups) may be influenced by callers. Comparisons
//! therefore always go through the canonical forms produced here.

// crates.io
use url::Url;
// self
use crate::_prelude::*;

/// Canonicalise a DNS name by trimming whitespace, removing any trailing dot, and lowercasing.
pub fn canonicalize_dns_name(value: &str) -> Option<String> {
	let trimmed = value.trim();
	if trimmed.is_empty() {
		return None;
	}

	let without_trailing_dot = trimmed.trim_end_matches('.');
	if without_trailing_dot.is_empty() {
		return None;
	}

	Some(without_trailing_dot.to_ascii_lowercase())
}

/// Canonical `host[:port]` authority of a URL, omitting the scheme's default port.
pub fn canonical_authority(url: &Url) -> Option<String> {
	let host = canonicalize_dns_name(url.host_str()?)?;

	match url.port() {
		Some(port) => Some(format!("{host}:{port}")),
		None => Some(host),
	}
}

/// Ensure the provided URL uses HTTPS.
pub fn enforce_https(url: &Url) -> Result<()> {
	if url.scheme() == "https" {
		Ok(())
	} else {
		Err(Error::Security(format!("Upstream URL {url} must use HTTPS.")))
	}
}

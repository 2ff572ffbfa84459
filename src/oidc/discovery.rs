//! Realm discovery document and signing key retrieval.

// crates.io
use jsonwebtoken::jwk::JwkSet;
use serde::{Deserialize, Serialize};
use url::Url;
// self
use crate::{
	_prelude::*,
	http::{client, transport::HttpTransport},
	router,
};

/// Subset of the OIDC provider metadata consumed by the verifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryDocument {
	/// Issuer identifier tokens of this realm carry in `iss`.
	pub issuer: String,
	/// Location of the realm's signing keys.
	pub jwks_uri: Url,
	#[allow(missing_docs)]
	#[serde(default)]
	pub token_endpoint: Option<Url>,
	#[allow(missing_docs)]
	#[serde(default)]
	pub authorization_endpoint: Option<Url>,
	#[allow(missing_docs)]
	#[serde(default)]
	pub userinfo_endpoint: Option<Url>,
	#[allow(missing_docs)]
	#[serde(default)]
	pub end_session_endpoint: Option<Url>,
	/// Algorithms the realm advertises for signing ID tokens.
	#[serde(default)]
	pub id_token_signing_alg_values_supported: Vec<String>,
}

/// Discovery location of `realm` under `base_uri`.
pub fn discovery_url(base_uri: &Url, realm: &str) -> Result<Url> {
	router::realm_url(base_uri, realm, &[".well-known", "openid-configuration"])
}

/// Issuer every token of `realm` under `base_uri` is expected to carry.
pub fn expected_issuer(base_uri: &Url, realm: &str) -> Result<String> {
	Ok(router::realm_url(base_uri, realm, &[])?.as_str().trim_end_matches('/').to_owned())
}

/// Fetch and check the discovery document of `realm`.
///
/// The advertised issuer must match the realm's public address; a mismatch means the request
/// reached a different realm or provider.
pub async fn discover(
	transport: &dyn HttpTransport,
	base_uri: &Url,
	realm: &str,
	max_response_bytes: u64,
) -> Result<DiscoveryDocument> {
	let url = discovery_url(base_uri, realm)?;
	let document: DiscoveryDocument =
		client::get_json(transport, &url, None, max_response_bytes).await?;
	let expected = expected_issuer(base_uri, realm)?;

	if document.issuer.trim_end_matches('/') != expected {
		return Err(Error::Discovery {
			realm: realm.to_owned(),
			reason: format!("Issuer {} does not match expected {expected}.", document.issuer),
		});
	}

	Ok(document)
}

/// Fetch the signing keys advertised by `document`.
pub async fn fetch_jwks(
	transport: &dyn HttpTransport,
	document: &DiscoveryDocument,
	max_response_bytes: u64,
) -> Result<JwkSet> {
	client::get_json(transport, &document.jwks_uri, None, max_response_bytes).await
}

//! Signature and claim verification against one realm's discovered keys.

// std
use std::collections::HashSet;
// crates.io
use jsonwebtoken::{Algorithm, DecodingKey, Validation, jwk::JwkSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;
// self
use crate::{
	_prelude::*,
	config::VerifierSettings,
	http::transport::HttpTransport,
	oidc::discovery::{self, DiscoveryDocument},
};

/// Claims read from a verified access token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
	/// Issuer; already checked against the realm's discovered issuer.
	pub iss: String,
	/// Expiry as seconds since the Unix epoch.
	pub exp: i64,
	#[allow(missing_docs)]
	#[serde(default)]
	pub sub: Option<String>,
	#[allow(missing_docs)]
	#[serde(default)]
	pub iat: Option<i64>,
	#[allow(missing_docs)]
	#[serde(default)]
	pub nbf: Option<i64>,
	/// Client the token was issued to.
	#[serde(default)]
	pub azp: Option<String>,
	#[allow(missing_docs)]
	#[serde(default)]
	pub preferred_username: Option<String>,
	/// Space-delimited scopes.
	#[serde(default)]
	pub scope: Option<String>,
	/// Every other claim, untouched.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
impl AccessTokenClaims {
	/// Expiry as a UTC timestamp.
	pub fn expires_at(&self) -> Option<DateTime<Utc>> {
		DateTime::from_timestamp(self.exp, 0)
	}
}

/// Token verifier for a single realm, built from its discovery document and signing keys.
#[derive(Debug)]
pub struct RealmVerifier {
	realm: String,
	document: DiscoveryDocument,
	keys: JwkSet,
	allowed_algorithms: Vec<Algorithm>,
	leeway: Duration,
}
impl RealmVerifier {
	/// Assemble a verifier from already-fetched metadata.
	pub fn new(
		realm: impl Into<String>,
		document: DiscoveryDocument,
		keys: JwkSet,
		settings: &VerifierSettings,
	) -> Self {
		Self {
			realm: realm.into(),
			document,
			keys,
			allowed_algorithms: settings.allowed_algorithms.clone(),
			leeway: settings.leeway,
		}
	}

	/// Run discovery for `realm` and fetch its signing keys.
	///
	/// Every failure except an expired deadline is reported as [`Error::Discovery`].
	#[tracing::instrument(skip_all, fields(realm = %realm, base_uri = %base_uri))]
	pub async fn discover(
		transport: &dyn HttpTransport,
		base_uri: &Url,
		realm: &str,
		settings: &VerifierSettings,
		max_response_bytes: u64,
	) -> Result<Self> {
		let fetch = async {
			let document = discovery::discover(transport, base_uri, realm, max_response_bytes).await?;
			let keys = discovery::fetch_jwks(transport, &document, max_response_bytes).await?;

			Ok::<_, Error>((document, keys))
		};
		let (document, keys) = fetch.await.map_err(|err| match err {
			err @ (Error::Timeout | Error::Discovery { .. }) => err,
			err => Error::Discovery { realm: realm.to_owned(), reason: err.to_string() },
		})?;

		tracing::debug!(issuer = %document.issuer, keys = keys.keys.len(), "realm discovered");

		Ok(Self::new(realm, document, keys, settings))
	}

	#[allow(missing_docs)]
	pub fn realm(&self) -> &str {
		&self.realm
	}

	/// Issuer accepted by this verifier.
	pub fn issuer(&self) -> &str {
		&self.document.issuer
	}

	#[allow(missing_docs)]
	pub fn document(&self) -> &DiscoveryDocument {
		&self.document
	}

	#[allow(missing_docs)]
	pub fn keys(&self) -> &JwkSet {
		&self.keys
	}

	/// Check signature, algorithm, issuer, and time-based claims of `token`.
	///
	/// The audience is not checked.
	pub fn verify(&self, token: &str) -> Result<AccessTokenClaims> {
		let header = jsonwebtoken::decode_header(token).map_err(|err| self.rejected(err))?;

		if !self.allowed_algorithms.contains(&header.alg) {
			return Err(self.rejected(format!("Algorithm {:?} is not allowed.", header.alg)));
		}

		let jwk = match header.kid.as_deref() {
			Some(kid) => self
				.keys
				.find(kid)
				.ok_or_else(|| self.rejected(format!("No signing key with kid '{kid}'.")))?,
			None => match self.keys.keys.as_slice() {
				[only] => only,
				keys => {
					return Err(self.rejected(format!(
						"Token has no kid and the realm publishes {} keys.",
						keys.len()
					)));
				},
			},
		};
		let key = DecodingKey::from_jwk(jwk).map_err(|err| self.rejected(err))?;
		let mut validation = Validation::new(header.alg);

		validation.set_issuer(&[self.issuer()]);
		validation.validate_aud = false;
		validation.validate_nbf = true;
		validation.leeway = self.leeway.as_secs();
		validation.required_spec_claims = HashSet::from(["exp".to_owned(), "iss".to_owned()]);

		let data = jsonwebtoken::decode::<AccessTokenClaims>(token, &key, &validation)
			.map_err(|err| self.rejected(err))?;

		Ok(data.claims)
	}

	fn rejected(&self, reason: impl ToString) -> Error {
		Error::Verification { realm: self.realm.clone(), reason: reason.to_string() }
	}
}

#[cfg(test)]
pub(crate) mod testing {
	//! Shared fixtures for verifier and cache tests.

	// crates.io
	use jsonwebtoken::{EncodingKey, Header};
	use serde_json::json;
	// self
	use super::*;

	pub const SECRET: &[u8] = b"realm-signing-secret-0123456789ab";
	pub const SECRET_B64: &str = "cmVhbG0tc2lnbmluZy1zZWNyZXQtMDEyMzQ1Njc4OWFi";
	pub const OTHER_SECRET: &[u8] = b"other-signing-secret-0123456789ab";
	pub const OTHER_SECRET_B64: &str = "b3RoZXItc2lnbmluZy1zZWNyZXQtMDEyMzQ1Njc4OWFi";

	pub fn settings() -> VerifierSettings {
		VerifierSettings { allowed_algorithms: vec![Algorithm::HS256], ..Default::default() }
	}

	pub fn jwks_json(kid: &str, secret_b64: &str) -> String {
		json!({ "keys": [{ "kty": "oct", "kid": kid, "k": secret_b64 }] }).to_string()
	}

	pub fn discovery_json(base: &str, realm: &str) -> String {
		let base = base.trim_end_matches('/');

		json!({
			"issuer": format!("{base}/auth/realms/{realm}"),
			"jwks_uri": format!("{base}/auth/realms/{realm}/protocol/openid-connect/certs"),
			"token_endpoint": format!("{base}/auth/realms/{realm}/protocol/openid-connect/token"),
		})
		.to_string()
	}

	pub fn token(issuer: &str, kid: Option<&str>, secret: &[u8], ttl_secs: i64) -> String {
		let now = Utc::now().timestamp();
		let mut header = Header::new(Algorithm::HS256);

		header.kid = kid.map(str::to_owned);

		jsonwebtoken::encode(
			&header,
			&json!({
				"iss": issuer,
				"sub": "service-user",
				"azp": "backoffice",
				"iat": now,
				"exp": now + ttl_secs,
				"realm_access": { "roles": ["admin"] },
			}),
			&EncodingKey::from_secret(secret),
		)
		.expect("token")
	}
}

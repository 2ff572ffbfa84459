//! Shared realm fixtures: HS256 signing material, discovery documents, and gateway configs.

// crates.io
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use realm_auth_cache::{RealmConfig, VerifierSettings};
use serde_json::json;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{method, path},
};

pub const SECRET: &[u8] = b"realm-signing-secret-0123456789ab";
pub const SECRET_B64: &str = "cmVhbG0tc2lnbmluZy1zZWNyZXQtMDEyMzQ1Njc4OWFi";
pub const TOKEN_PATH: &str = "/auth/realms/master/protocol/openid-connect/token";

/// Configuration with every realm served by `server`, plain HTTP allowed, and HS256 accepted.
pub fn local_config(server: &MockServer) -> RealmConfig {
	RealmConfig::new([("r1", server.uri()), ("r2", server.uri())], "r1")
		.with_require_https(false)
		.with_verifier(VerifierSettings {
			allowed_algorithms: vec![Algorithm::HS256],
			..Default::default()
		})
}

/// Serve discovery and JWKS for `realm`, advertising `public_base` as the realm's address.
pub async fn mount_realm(server: &MockServer, public_base: &str, realm: &str) {
	let issuer = format!("{}/auth/realms/{realm}", public_base.trim_end_matches('/'));

	Mock::given(method("GET"))
		.and(path(format!("/auth/realms/{realm}/.well-known/openid-configuration")))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"issuer": issuer,
			"jwks_uri": format!("{issuer}/protocol/openid-connect/certs"),
			"token_endpoint": format!("{issuer}/protocol/openid-connect/token"),
			"id_token_signing_alg_values_supported": ["HS256"],
		})))
		.expect(1)
		.mount(server)
		.await;
	Mock::given(method("GET"))
		.and(path(format!("/auth/realms/{realm}/protocol/openid-connect/certs")))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"keys": [{ "kty": "oct", "kid": "k1", "k": SECRET_B64 }],
		})))
		.expect(1)
		.mount(server)
		.await;
}

/// HS256 access token issued by `issuer` and valid for five minutes.
pub fn access_token(issuer: &str) -> String {
	let now = Utc::now().timestamp();
	let mut header = Header::new(Algorithm::HS256);

	header.kid = Some("k1".into());

	jsonwebtoken::encode(
		&header,
		&json!({ "iss": issuer, "sub": "user-1", "iat": now, "exp": now + 300 }),
		&EncodingKey::from_secret(SECRET),
	)
	.expect("token")
}

pub fn token_response(access_token: &str) -> ResponseTemplate {
	ResponseTemplate::new(200).set_body_json(json!({
		"access_token": access_token,
		"expires_in": 300,
		"refresh_expires_in": 1800,
		"refresh_token": "refresh-1",
		"token_type": "Bearer",
	}))
}

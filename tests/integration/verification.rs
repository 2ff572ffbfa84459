//! Token verification against discovered realm keys.

// crates.io
use jsonwebtoken::Algorithm;
use realm_auth_cache::{
	Deadline, Error, RealmConfig, RealmGateway, Result, TokenProviderConfig, VerifierSettings,
};
use url::Url;
use wiremock::MockServer;
// self
use crate::fixtures;

fn credentials() -> TokenProviderConfig {
	TokenProviderConfig::client_credentials("master", "backend", "s3cr3t")
}

#[tokio::test]
async fn tokens_verify_against_discovered_keys() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	fixtures::mount_realm(&server, &server.uri(), "r1").await;

	let gateway = RealmGateway::builder(fixtures::local_config(&server))
		.token_provider(credentials())
		.build()?;
	let issuer = format!("{}/auth/realms/r1", server.uri());
	let token = fixtures::access_token(&issuer);

	for _ in 0..3 {
		let claims = gateway.verify_token(&issuer, "r1", &token, Deadline::none()).await?;

		assert_eq!(claims.iss, issuer);
		assert_eq!(claims.sub.as_deref(), Some("user-1"));
	}

	// Within the error tolerance a bad token leaves the cached verifier in place.
	let tampered = format!("{token}x");
	let err = gateway.verify_token(&issuer, "r1", &tampered, Deadline::none()).await.unwrap_err();

	assert!(matches!(err, Error::Verification { .. }));

	gateway.verify_token(&issuer, "r1", &token, Deadline::none()).await?;

	let status = gateway.issuers().resolve_verifier(&issuer)?.status().await;

	assert_eq!(status.len(), 1);
	assert!(status[0].valid);

	Ok(())
}

#[tokio::test]
async fn foreign_issuers_are_rejected() -> Result<()> {
	let server = MockServer::start().await;
	let gateway = RealmGateway::builder(fixtures::local_config(&server))
		.token_provider(credentials())
		.build()?;
	let token = fixtures::access_token("https://evil.example.com/auth/realms/r1");
	let err = gateway
		.verify_token("https://evil.example.com/auth/realms/r1", "r1", &token, Deadline::none())
		.await
		.unwrap_err();

	assert!(matches!(err, Error::UnknownIssuer { .. }));
	assert!(server.received_requests().await.unwrap_or_default().is_empty());

	Ok(())
}

#[tokio::test]
async fn forwarded_discovery_keeps_the_public_issuer() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	fixtures::mount_realm(&server, "https://eu.example.com", "r1").await;

	let config = RealmConfig::new([("eu", "https://eu.example.com")], "eu")
		.with_internal_uri(Url::parse(&server.uri()).expect("mock url"))
		.with_verifier(VerifierSettings {
			allowed_algorithms: vec![Algorithm::HS256],
			..Default::default()
		});
	let gateway = RealmGateway::builder(config).token_provider(credentials()).build()?;
	let issuer = "https://eu.example.com/auth/realms/r1";
	let claims = gateway
		.verify_token(issuer, "r1", &fixtures::access_token(issuer), Deadline::none())
		.await?;

	assert_eq!(claims.iss, issuer);

	let requests = server.received_requests().await.expect("recording enabled");

	assert_eq!(requests.len(), 2);
	assert!(requests.iter().all(|request| {
		request
			.headers
			.get("forwarded")
			.is_some_and(|value| value == "host=eu.example.com;proto=https")
	}));

	Ok(())
}

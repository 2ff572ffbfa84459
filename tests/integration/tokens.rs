//! Service token acquisition over HTTP.

// crates.io
use realm_auth_cache::{Deadline, RealmConfig, RealmGateway, Result, TokenProviderConfig};
use url::Url;
use wiremock::{
	Mock, MockServer,
	matchers::{body_string_contains, header, method, path},
};
// self
use crate::fixtures::{self, TOKEN_PATH};

#[tokio::test]
async fn service_tokens_are_exchanged_once() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path(TOKEN_PATH))
		.and(header("content-type", "application/x-www-form-urlencoded"))
		.and(body_string_contains("grant_type=password"))
		.and(body_string_contains("username=svc-user"))
		.respond_with(fixtures::token_response("svc-token"))
		.expect(1)
		.mount(&server)
		.await;

	let gateway = RealmGateway::builder(fixtures::local_config(&server))
		.token_provider(TokenProviderConfig::password("master", "svc-user", "s3cr3t", "admin-cli"))
		.build()?;

	assert_eq!(gateway.provide_token("r1", Deadline::none()).await?, "svc-token");
	assert_eq!(gateway.provide_token("R1", Deadline::none()).await?, "svc-token");
	// Unknown keys share the default realm's source.
	assert_eq!(gateway.provide_token("asia", Deadline::none()).await?, "svc-token");

	Ok(())
}

#[tokio::test]
async fn forwarded_token_requests_reach_the_internal_address() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path(TOKEN_PATH))
		.and(header("forwarded", "host=eu.example.com;proto=https"))
		.and(body_string_contains("grant_type=client_credentials"))
		.respond_with(fixtures::token_response("eu-token"))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path(TOKEN_PATH))
		.and(header("forwarded", "host=us.example.com;proto=https"))
		.respond_with(fixtures::token_response("us-token"))
		.expect(1)
		.mount(&server)
		.await;

	let config =
		RealmConfig::new([("eu", "https://eu.example.com"), ("us", "https://us.example.com")], "eu")
			.with_internal_uri(Url::parse(&server.uri()).expect("mock url"));
	let gateway = RealmGateway::builder(config)
		.token_provider(TokenProviderConfig::client_credentials("master", "backend", "s3cr3t"))
		.build()?;

	assert_eq!(gateway.provide_token("eu", Deadline::none()).await?, "eu-token");
	assert_eq!(gateway.provide_token("us", Deadline::none()).await?, "us-token");
	assert_eq!(gateway.provide_token("us", Deadline::none()).await?, "us-token");

	Ok(())
}

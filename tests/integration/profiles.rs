//! User-profile lookups through the admin API.

// std
use std::sync::Arc;
// crates.io
use realm_auth_cache::{Deadline, RealmGateway, Result, TokenProviderConfig, UserProfile};
use serde_json::json;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{header, method, path},
};
// self
use crate::fixtures::{self, TOKEN_PATH};

async fn mount_token(server: &MockServer) {
	Mock::given(method("POST"))
		.and(path(TOKEN_PATH))
		.respond_with(fixtures::token_response("svc-token"))
		.expect(1)
		.mount(server)
		.await;
}

#[tokio::test]
async fn profiles_are_fetched_once_with_a_service_token() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	mount_token(&server).await;
	Mock::given(method("GET"))
		.and(path("/auth/admin/realms/r1/users/profile"))
		.and(header("authorization", "Bearer svc-token"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"attributes": [
				{ "name": "username" },
				{ "name": "nationality", "annotations": { "dynamic": "true" } },
			],
			"groups": [{ "name": "user-metadata" }],
		})))
		.expect(1)
		.mount(&server)
		.await;

	let gateway = RealmGateway::builder(fixtures::local_config(&server))
		.token_provider(TokenProviderConfig::client_credentials("master", "backend", "s3cr3t"))
		.build()?;
	let first = gateway.realm_user_profile("r1", Deadline::none()).await?;

	for _ in 0..3 {
		assert!(Arc::ptr_eq(&first, &gateway.realm_user_profile("r1", Deadline::none()).await?));
	}

	assert_eq!(first.dynamic_attribute_keys().collect::<Vec<_>>(), ["nationality"]);
	assert_eq!(first.groups.len(), 1);

	Ok(())
}

#[tokio::test]
async fn realms_without_user_profiles_get_the_default() -> Result<()> {
	let server = MockServer::start().await;

	mount_token(&server).await;
	Mock::given(method("GET"))
		.and(path("/auth/admin/realms/r1"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"id": "r1",
			"realm": "r1",
			"enabled": true,
			"attributes": { "userProfileEnabled": "false" },
		})))
		.expect(2)
		.mount(&server)
		.await;
	Mock::given(method("GET"))
		.and(path("/auth/admin/realms/r1/users/profile"))
		.respond_with(ResponseTemplate::new(500))
		.expect(0)
		.mount(&server)
		.await;

	let gateway = RealmGateway::builder(fixtures::local_config(&server))
		.token_provider(TokenProviderConfig::client_credentials("master", "backend", "s3cr3t"))
		.default_profile(Arc::new(|_realm: &str| -> Result<UserProfile> {
			Ok(serde_json::from_value(json!({ "attributes": [{ "name": "email" }] }))?)
		}))
		.build()?;
	let profile = gateway.realm_user_profile("r1", Deadline::none()).await?;

	gateway.realm_user_profile("r1", Deadline::none()).await?;

	assert_eq!(profile.attributes[0].name.as_deref(), Some("email"));

	Ok(())
}

//! Single entry point wiring the router, verifier caches, token provider, and profile cache.

// std
use std::fmt::{Debug, Formatter, Result as FmtResult};
// self
use crate::{
	_prelude::*,
	cache::profile::ProfileCache,
	config::RealmConfig,
	http::transport::{HttpTransport, ReqwestTransport},
	issuer::IssuerResolver,
	oidc::AccessTokenClaims,
	profile::{DefaultProfileProvider, HttpProfileRetriever, ProfileRetriever, UserProfile},
	router::RealmRouter,
	token::provider::{TokenProvider, TokenProviderConfig},
};

/// Credential services for every configured realm.
pub struct RealmGateway {
	router: Arc<RealmRouter>,
	issuers: IssuerResolver,
	tokens: Arc<TokenProvider>,
	profiles: ProfileCache,
}
impl RealmGateway {
	/// Start building a gateway for `config`.
	pub fn builder(config: RealmConfig) -> RealmGatewayBuilder {
		RealmGatewayBuilder {
			config,
			transport: None,
			token_provider: None,
			profile_retriever: None,
			default_profile: None,
		}
	}

	#[allow(missing_docs)]
	pub fn router(&self) -> &Arc<RealmRouter> {
		&self.router
	}

	#[allow(missing_docs)]
	pub fn issuers(&self) -> &IssuerResolver {
		&self.issuers
	}

	#[allow(missing_docs)]
	pub fn token_provider(&self) -> &Arc<TokenProvider> {
		&self.tokens
	}

	#[allow(missing_docs)]
	pub fn profiles(&self) -> &ProfileCache {
		&self.profiles
	}

	/// Service access token for `realm`; unknown realms use the default realm's token.
	pub async fn provide_token(&self, realm: &str, deadline: Deadline) -> Result<String> {
		self.tokens.provide_token_for_realm(realm, deadline).await
	}

	/// Verify `token` for `realm` with the verifier cache of `issuer`.
	///
	/// Unknown issuers are rejected and never fall back to a default realm.
	#[tracing::instrument(skip(self, token, deadline))]
	pub async fn verify_token(
		&self,
		issuer: &str,
		realm: &str,
		token: &str,
		deadline: Deadline,
	) -> Result<AccessTokenClaims> {
		let cache = self.issuers.resolve_verifier(issuer)?;

		cache.verify(realm, token, deadline).await
	}

	/// User-profile schema of `realm`, fetched with a service token on first use.
	pub async fn realm_user_profile(
		&self,
		realm: &str,
		deadline: Deadline,
	) -> Result<Arc<UserProfile>> {
		self.profiles.get_realm_user_profile(realm, deadline).await
	}

	/// User-profile schema of `realm`, fetched with the caller's token on first use.
	pub async fn realm_user_profile_with_token(
		&self,
		access_token: &str,
		realm: &str,
		deadline: Deadline,
	) -> Result<Arc<UserProfile>> {
		self.profiles.get_realm_user_profile_with_token(access_token, realm, deadline).await
	}
}
impl Debug for RealmGateway {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("RealmGateway")
			.field("router", &self.router)
			.field("issuers", &self.issuers)
			.field("tokens", &self.tokens)
			.field("profiles", &self.profiles)
			.finish()
	}
}

/// Builder for [`RealmGateway`].
pub struct RealmGatewayBuilder {
	config: RealmConfig,
	transport: Option<Arc<dyn HttpTransport>>,
	token_provider: Option<TokenProviderConfig>,
	profile_retriever: Option<Arc<dyn ProfileRetriever>>,
	default_profile: Option<DefaultProfileProvider>,
}
impl RealmGatewayBuilder {
	/// Use `transport` for every outbound request instead of a fresh `reqwest` client.
	pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
		self.transport = Some(transport);

		self
	}

	/// Credentials used to obtain service tokens. Required.
	pub fn token_provider(mut self, config: TokenProviderConfig) -> Self {
		self.token_provider = Some(config);

		self
	}

	/// Replace the admin-API profile retriever.
	pub fn profile_retriever(mut self, retriever: Arc<dyn ProfileRetriever>) -> Self {
		self.profile_retriever = Some(retriever);

		self
	}

	/// Profile served for realms without declarative user profiles.
	pub fn default_profile(mut self, provider: DefaultProfileProvider) -> Self {
		self.default_profile = Some(provider);

		self
	}

	/// Validate the configuration and assemble the gateway.
	pub fn build(self) -> Result<RealmGateway> {
		let Self { config, transport, token_provider, profile_retriever, default_profile } = self;
		let token_config = token_provider
			.ok_or_else(|| Error::config("token_provider", "Token credentials are required."))?;
		let router = Arc::new(config.router()?);
		let transport = match transport {
			Some(transport) => transport,
			None => Arc::new(ReqwestTransport::new(config.timeout)?),
		};
		let internal_uri = config.internal_uri.as_ref();
		let issuers = IssuerResolver::from_router(
			&router,
			transport.clone(),
			internal_uri,
			&config.verifier,
			config.max_response_bytes,
		)?;
		let tokens = Arc::new(TokenProvider::new(
			router.clone(),
			token_config,
			transport.clone(),
			config.internal_uri.clone(),
			config.max_response_bytes,
		)?);
		let retriever = match profile_retriever {
			Some(retriever) => retriever,
			None => Arc::new(HttpProfileRetriever::new(
				router.clone(),
				transport,
				internal_uri,
				config.max_response_bytes,
			)?),
		};
		let mut profiles = ProfileCache::new(tokens.clone(), retriever);

		if let Some(default_profile) = default_profile {
			profiles = profiles.with_default_profile(default_profile);
		}

		tracing::info!(
			realms = router.entries().count(),
			default_realm = router.default_key(),
			forwarded = internal_uri.is_some(),
			"realm gateway ready"
		);

		Ok(RealmGateway { router, issuers, tokens, profiles })
	}
}
impl Debug for RealmGatewayBuilder {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("RealmGatewayBuilder")
			.field("config", &self.config)
			.field("token_provider", &self.token_provider)
			.field("default_profile", &self.default_profile.is_some())
			.finish_non_exhaustive()
	}
}

//! Per-realm service token provider over the two supported credential flows.
//!
//! Realm keys follow the router's policy: an unknown key gets the default realm's token.

// std
use std::{
	collections::HashMap,
	fmt::{Debug, Formatter, Result as FmtResult},
};
// crates.io
use serde::Deserialize;
use tokio::sync::RwLock;
use url::Url;
// self
use crate::{
	_prelude::*,
	http::{forwarded::ForwardingTransport, transport::HttpTransport},
	router::RealmRouter,
	token::{secret::Secret, source::TokenSource},
};

/// Default margin before expiry at which a cached token is renewed.
pub const DEFAULT_EXPIRY_LEEWAY: Duration = Duration::from_secs(10);

/// Boxed future returned by [`ProvideToken::provide_token`].
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + 'a + Send>>;

/// Source of service access tokens, keyed by realm.
pub trait ProvideToken
where
	Self: 'static + Send + Sync,
{
	/// Access token for `realm`, falling back to the default realm for unknown keys.
	fn provide_token<'a>(&'a self, realm: &'a str, deadline: Deadline) -> TokenFuture<'a>;
}

/// Credentials presented to the token endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "flow", rename_all = "snake_case")]
pub enum Credentials {
	/// Resource-owner password grant for a technical user.
	Password {
		#[allow(missing_docs)]
		username: String,
		#[allow(missing_docs)]
		password: Secret,
		#[allow(missing_docs)]
		client_id: String,
	},
	/// Client-credentials grant.
	ClientCredentials {
		#[allow(missing_docs)]
		client_id: String,
		#[allow(missing_docs)]
		client_secret: Secret,
	},
}
impl Credentials {
	#[allow(missing_docs)]
	pub fn client_id(&self) -> &str {
		match self {
			Self::Password { client_id, .. } | Self::ClientCredentials { client_id, .. } => client_id,
		}
	}
}

/// Token provider configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenProviderConfig {
	/// Realm whose token endpoint is used on every host.
	pub realm: String,
	#[allow(missing_docs)]
	pub credentials: Credentials,
	/// Tokens closer than this to their expiry are renewed before use; capped at half the token
	/// lifetime.
	#[serde(default = "default_expiry_leeway")]
	pub expiry_leeway: Duration,
}
impl TokenProviderConfig {
	/// Resource-owner password flow.
	pub fn password(
		realm: impl Into<String>,
		username: impl Into<String>,
		password: impl Into<Secret>,
		client_id: impl Into<String>,
	) -> Self {
		Self {
			realm: realm.into(),
			credentials: Credentials::Password {
				username: username.into(),
				password: password.into(),
				client_id: client_id.into(),
			},
			expiry_leeway: DEFAULT_EXPIRY_LEEWAY,
		}
	}

	/// Client-credentials flow.
	pub fn client_credentials(
		realm: impl Into<String>,
		client_id: impl Into<String>,
		client_secret: impl Into<Secret>,
	) -> Self {
		Self {
			realm: realm.into(),
			credentials: Credentials::ClientCredentials {
				client_id: client_id.into(),
				client_secret: client_secret.into(),
			},
			expiry_leeway: DEFAULT_EXPIRY_LEEWAY,
		}
	}

	/// Override the renewal margin.
	pub fn with_expiry_leeway(mut self, expiry_leeway: Duration) -> Self {
		self.expiry_leeway = expiry_leeway;

		self
	}

	/// Validate the configuration against the documented constraints.
	pub fn validate(&self) -> Result<()> {
		if self.realm.trim().is_empty() {
			return Err(Error::config("token.realm", "Must not be empty."));
		}
		if self.credentials.client_id().trim().is_empty() {
			return Err(Error::config("token.credentials.client_id", "Must not be empty."));
		}
		if let Credentials::Password { username, .. } = &self.credentials
			&& username.trim().is_empty()
		{
			return Err(Error::config("token.credentials.username", "Must not be empty."));
		}

		Ok(())
	}
}

enum Sources {
	/// Resource-owner flow: created on first use of each realm.
	Lazy(RwLock<HashMap<String, Arc<TokenSource>>>),
	/// Client-credentials flow: one per router entry, built up front.
	Eager(HashMap<String, Arc<TokenSource>>),
}

/// Hands out cached service tokens for every realm known to the router.
pub struct TokenProvider {
	router: Arc<RealmRouter>,
	config: TokenProviderConfig,
	transport: Arc<dyn HttpTransport>,
	internal_uri: Option<Url>,
	max_response_bytes: u64,
	sources: Sources,
}
impl TokenProvider {
	/// Create a provider; the client-credentials flow builds every realm's source immediately.
	pub fn new(
		router: Arc<RealmRouter>,
		config: TokenProviderConfig,
		transport: Arc<dyn HttpTransport>,
		internal_uri: Option<Url>,
		max_response_bytes: u64,
	) -> Result<Self> {
		config.validate()?;

		let mut provider = Self {
			router,
			config,
			transport,
			internal_uri,
			max_response_bytes,
			sources: Sources::Lazy(RwLock::new(HashMap::new())),
		};

		if let Credentials::ClientCredentials { .. } = provider.config.credentials {
			let mut sources = HashMap::new();

			for entry in provider.router.entries() {
				sources.insert(entry.key.clone(), Arc::new(provider.build_source(&entry.key)?));
			}

			provider.sources = Sources::Eager(sources);
		}

		Ok(provider)
	}

	#[allow(missing_docs)]
	pub fn config(&self) -> &TokenProviderConfig {
		&self.config
	}

	/// Token for the default realm.
	pub async fn provide_token(&self, deadline: Deadline) -> Result<String> {
		let default_key = self.router.default_key().to_owned();

		self.provide_token_for_realm(&default_key, deadline).await
	}

	/// Token for `realm`, or for the default realm when `realm` is unknown.
	#[tracing::instrument(skip(self, deadline))]
	pub async fn provide_token_for_realm(&self, realm: &str, deadline: Deadline) -> Result<String> {
		self.source(realm).await?.token(deadline).await
	}

	/// Token source serving `realm`, after the default-realm fallback.
	pub async fn source(&self, realm: &str) -> Result<Arc<TokenSource>> {
		let requested = realm.to_lowercase();
		let key = if self.router.contains(&requested) {
			requested
		} else {
			tracing::debug!(realm, "unknown realm key; using the default realm");

			self.router.default_key().to_owned()
		};

		match &self.sources {
			Sources::Eager(sources) =>
				sources.get(&key).cloned().ok_or(Error::UnknownRealm { realm: key }),
			Sources::Lazy(sources) => {
				if let Some(source) = sources.read().await.get(&key) {
					return Ok(source.clone());
				}

				let mut sources = sources.write().await;

				if let Some(source) = sources.get(&key) {
					return Ok(source.clone());
				}

				let source = Arc::new(self.build_source(&key)?);

				sources.insert(key, source.clone());

				Ok(source)
			},
		}
	}

	fn build_source(&self, key: &str) -> Result<TokenSource> {
		let entry =
			self.router.get(key).ok_or_else(|| Error::UnknownRealm { realm: key.to_owned() })?;
		let transport = ForwardingTransport::for_realm(
			self.transport.clone(),
			self.internal_uri.as_ref(),
			&entry.base_uri,
		)?;

		TokenSource::for_entry(entry, &self.config, transport, self.max_response_bytes)
	}
}
impl Debug for TokenProvider {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("TokenProvider")
			.field("realm", &self.config.realm)
			.field("credentials", &self.config.credentials)
			.field("default_key", &self.router.default_key())
			.finish_non_exhaustive()
	}
}
impl ProvideToken for TokenProvider {
	fn provide_token<'a>(&'a self, realm: &'a str, deadline: Deadline) -> TokenFuture<'a> {
		Box::pin(self.provide_token_for_realm(realm, deadline))
	}
}

fn default_expiry_leeway() -> Duration {
	DEFAULT_EXPIRY_LEEWAY
}

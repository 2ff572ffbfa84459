//! Read-through cache of realm user-profile schemas.
//!
//! Profiles are loaded once per realm and kept for the lifetime of the cache. Two callers missing
//! the same realm at once may both fetch; the first stored profile is the one every caller gets
//! from then on.

// std
use std::{
	collections::HashMap,
	fmt::{Debug, Formatter, Result as FmtResult},
};
// crates.io
use tokio::sync::Mutex;
// self
use crate::{
	_prelude::*,
	metrics,
	profile::{DefaultProfileProvider, ProfileRetriever, UserProfile},
	token::provider::ProvideToken,
};

/// Per-realm user-profile cache.
pub struct ProfileCache {
	token_provider: Arc<dyn ProvideToken>,
	retriever: Arc<dyn ProfileRetriever>,
	default_profile: Option<DefaultProfileProvider>,
	profiles: Mutex<HashMap<String, Arc<UserProfile>>>,
}
impl ProfileCache {
	/// Create an empty cache.
	pub fn new(token_provider: Arc<dyn ProvideToken>, retriever: Arc<dyn ProfileRetriever>) -> Self {
		Self { token_provider, retriever, default_profile: None, profiles: Mutex::new(HashMap::new()) }
	}

	/// Serve `provider`'s profile for realms whose declarative user profile is disabled.
	///
	/// Such profiles are not cached.
	pub fn with_default_profile(mut self, provider: DefaultProfileProvider) -> Self {
		self.default_profile = Some(provider);

		self
	}

	/// Profile of `realm`, fetched with a service token on first use.
	#[tracing::instrument(skip(self, deadline))]
	pub async fn get_realm_user_profile(
		&self,
		realm: &str,
		deadline: Deadline,
	) -> Result<Arc<UserProfile>> {
		if let Some(profile) = self.cached(realm).await {
			return Ok(profile);
		}

		deadline
			.run(async {
				let token = self.token_provider.provide_token(realm, deadline).await?;

				self.load(&token, realm).await
			})
			.await
			.inspect_err(|_| metrics::record_profile_lookup(realm, "error"))
	}

	/// Profile of `realm`, fetched with the caller's `access_token` on first use.
	#[tracing::instrument(skip(self, access_token, deadline))]
	pub async fn get_realm_user_profile_with_token(
		&self,
		access_token: &str,
		realm: &str,
		deadline: Deadline,
	) -> Result<Arc<UserProfile>> {
		if let Some(profile) = self.cached(realm).await {
			return Ok(profile);
		}

		deadline
			.run(self.load(access_token, realm))
			.await
			.inspect_err(|_| metrics::record_profile_lookup(realm, "error"))
	}

	async fn cached(&self, realm: &str) -> Option<Arc<UserProfile>> {
		let profile = self.profiles.lock().await.get(realm).cloned();

		if profile.is_some() {
			metrics::record_profile_lookup(realm, "hit");
		}

		profile
	}

	async fn load(&self, access_token: &str, realm: &str) -> Result<Arc<UserProfile>> {
		if let Some(default_profile) = &self.default_profile {
			let summary = self.retriever.realm(access_token, realm).await?;

			if !summary.is_user_profile_enabled() {
				tracing::debug!("user profile disabled for realm; serving the default profile");
				metrics::record_profile_lookup(realm, "fallback");

				let mut profile = default_profile(realm)?;

				profile.index_dynamic_attributes();

				return Ok(Arc::new(profile));
			}
		}

		let mut profile = self.retriever.user_profile(access_token, realm).await?;

		profile.index_dynamic_attributes();
		metrics::record_profile_lookup(realm, "fetched");
		tracing::debug!(attributes = profile.attributes.len(), "user profile loaded");

		let mut profiles = self.profiles.lock().await;

		Ok(profiles.entry(realm.to_owned()).or_insert_with(|| Arc::new(profile)).clone())
	}
}
impl Debug for ProfileCache {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("ProfileCache")
			.field("default_profile", &self.default_profile.is_some())
			.finish_non_exhaustive()
	}
}

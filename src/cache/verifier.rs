//! Lazily built, per-realm token verifiers for one identity provider.
//!
//! Entries live for `cache_ttl`. A verification failure observed once `error_tolerance` has passed
//! since the entry was built expires it early, so a rotated signing key is picked up on the next
//! lookup instead of after the full TTL.
//!
//! Concurrent misses for the same realm may each run discovery; the entry with the latest expiry
//! wins when they are stored.

// std
use std::{
	collections::HashMap,
	fmt::{Debug, Formatter, Result as FmtResult},
};
// crates.io
use tokio::sync::RwLock;
use url::Url;
// self
use crate::{
	_prelude::*,
	cache::entry::CacheEntry,
	config::VerifierSettings,
	http::transport::HttpTransport,
	issuer,
	metrics::{self, CacheMetrics},
	oidc::{AccessTokenClaims, RealmVerifier},
};

/// Wall-clock view of one cached verifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifierStatus {
	#[allow(missing_docs)]
	pub realm: String,
	/// Issuer accepted by the cached verifier.
	pub issuer: String,
	#[allow(missing_docs)]
	pub created_at: DateTime<Utc>,
	#[allow(missing_docs)]
	pub valid_until: DateTime<Utc>,
	#[allow(missing_docs)]
	pub invalidate_on_error_until: DateTime<Utc>,
	/// Whether the next lookup would reuse the entry.
	pub valid: bool,
}

/// Verifier cache for every realm served under one base URI.
pub struct VerifierCache {
	base_uri: Url,
	issuer: String,
	transport: Arc<dyn HttpTransport>,
	settings: VerifierSettings,
	max_response_bytes: u64,
	entries: RwLock<HashMap<String, CacheEntry>>,
	metrics: Arc<CacheMetrics>,
}
impl VerifierCache {
	/// Create an empty cache reaching `base_uri` through `transport`.
	pub fn new(
		base_uri: Url,
		transport: Arc<dyn HttpTransport>,
		settings: VerifierSettings,
		max_response_bytes: u64,
	) -> Self {
		Self {
			issuer: issuer::issuer_of(base_uri.as_str()),
			base_uri,
			transport,
			settings,
			max_response_bytes,
			entries: RwLock::new(HashMap::new()),
			metrics: CacheMetrics::new(),
		}
	}

	#[allow(missing_docs)]
	pub fn base_uri(&self) -> &Url {
		&self.base_uri
	}

	#[allow(missing_docs)]
	pub fn settings(&self) -> &VerifierSettings {
		&self.settings
	}

	/// Per-cache counters.
	pub fn metrics(&self) -> Arc<CacheMetrics> {
		self.metrics.clone()
	}

	/// Verifier for `realm`, running discovery when no valid entry exists.
	///
	/// A failed discovery leaves any previous entry untouched.
	#[tracing::instrument(skip(self, deadline), fields(issuer = %self.issuer))]
	pub async fn get_verifier(&self, realm: &str, deadline: Deadline) -> Result<Arc<RealmVerifier>> {
		{
			let entries = self.entries.read().await;

			if let Some(entry) = entries.get(realm)
				&& entry.is_valid(Instant::now())
			{
				self.metrics.record_hit();
				metrics::record_verifier_lookup(&self.issuer, realm, true);

				return Ok(entry.verifier().clone());
			}
		}

		self.metrics.record_miss();
		metrics::record_verifier_lookup(&self.issuer, realm, false);
		tracing::debug!("verifier missing or expired; running discovery");

		let created_at = Instant::now();
		let verifier = deadline
			.run(RealmVerifier::discover(
				self.transport.as_ref(),
				&self.base_uri,
				realm,
				&self.settings,
				self.max_response_bytes,
			))
			.await
			.inspect_err(|err| tracing::warn!(error = %err, "verifier discovery failed"))?;
		let fresh = CacheEntry::new(Arc::new(verifier), created_at, &self.settings);
		let mut entries = self.entries.write().await;

		if let Some(existing) = entries.get(realm)
			&& existing.is_valid(Instant::now())
			&& existing.valid_until() > fresh.valid_until()
		{
			tracing::debug!("newer verifier stored concurrently; discarding this one");

			return Ok(existing.verifier().clone());
		}

		let verifier = fresh.verifier().clone();

		entries.insert(realm.to_owned(), fresh);
		self.metrics.record_rebuild();

		Ok(verifier)
	}

	/// Verify `token` against the current verifier of `realm`.
	pub async fn verify(
		&self,
		realm: &str,
		token: &str,
		deadline: Deadline,
	) -> Result<AccessTokenClaims> {
		let verifier = self.get_verifier(realm, deadline).await?;

		self.verify_with(realm, &verifier, token).await
	}

	/// Verify `token` with a verifier previously returned by [`Self::get_verifier`].
	///
	/// On failure the cached entry is expired when it is still `verifier` and its error tolerance
	/// has passed.
	pub async fn verify_with(
		&self,
		realm: &str,
		verifier: &Arc<RealmVerifier>,
		token: &str,
	) -> Result<AccessTokenClaims> {
		match verifier.verify(token) {
			Ok(claims) => Ok(claims),
			Err(err) => {
				self.invalidate_on_error(realm, verifier).await;

				Err(err)
			},
		}
	}

	/// Wall-clock status of every cached realm.
	pub async fn status(&self) -> Vec<VerifierStatus> {
		let now = Instant::now();
		let wall = Utc::now();
		let entries = self.entries.read().await;
		let mut status = entries
			.iter()
			.map(|(realm, entry)| VerifierStatus {
				realm: realm.clone(),
				issuer: entry.verifier().issuer().to_owned(),
				created_at: to_datetime(now, wall, entry.created_at()),
				valid_until: to_datetime(now, wall, entry.valid_until()),
				invalidate_on_error_until: to_datetime(now, wall, entry.invalidate_on_error_until()),
				valid: entry.is_valid(now),
			})
			.collect::<Vec<_>>();

		status.sort_by(|a, b| a.realm.cmp(&b.realm));

		status
	}

	async fn invalidate_on_error(&self, realm: &str, verifier: &Arc<RealmVerifier>) {
		let now = Instant::now();
		let mut entries = self.entries.write().await;

		if let Some(entry) = entries.get_mut(realm)
			&& Arc::ptr_eq(entry.verifier(), verifier)
			&& entry.can_invalidate_on_error(now)
		{
			entry.expire();
			self.metrics.record_invalidation();
			metrics::record_verifier_invalidation(&self.issuer, realm);
			tracing::warn!(issuer = %self.issuer, realm, "verification failed; verifier expired early");
		}
	}
}
impl Debug for VerifierCache {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("VerifierCache")
			.field("base_uri", &self.base_uri.as_str())
			.field("settings", &self.settings)
			.finish_non_exhaustive()
	}
}

fn to_datetime(now: Instant, wall: DateTime<Utc>, at: Instant) -> DateTime<Utc> {
	let shifted = if at >= now {
		TimeDelta::from_std(at - now).ok().and_then(|delta| wall.checked_add_signed(delta))
	} else {
		TimeDelta::from_std(now - at).ok().and_then(|delta| wall.checked_sub_signed(delta))
	};

	shifted.unwrap_or(wall)
}

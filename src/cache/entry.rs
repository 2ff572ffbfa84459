//! Cached verifier entry and its expiry policy.

// self
use crate::{_prelude::*, config::VerifierSettings, oidc::RealmVerifier};

/// A verifier together with the instants that govern its lifetime.
#[derive(Clone, Debug)]
pub struct CacheEntry {
	verifier: Arc<RealmVerifier>,
	created_at: Instant,
	valid_until: Instant,
	invalidate_on_error_until: Instant,
}
impl CacheEntry {
	/// Wrap `verifier`, whose construction started at `created_at`.
	pub fn new(verifier: Arc<RealmVerifier>, created_at: Instant, settings: &VerifierSettings) -> Self {
		Self {
			verifier,
			created_at,
			valid_until: created_at + settings.cache_ttl,
			invalidate_on_error_until: created_at + settings.error_tolerance,
		}
	}

	#[allow(missing_docs)]
	pub fn verifier(&self) -> &Arc<RealmVerifier> {
		&self.verifier
	}

	#[allow(missing_docs)]
	pub fn created_at(&self) -> Instant {
		self.created_at
	}

	#[allow(missing_docs)]
	pub fn valid_until(&self) -> Instant {
		self.valid_until
	}

	#[allow(missing_docs)]
	pub fn invalidate_on_error_until(&self) -> Instant {
		self.invalidate_on_error_until
	}

	/// Whether lookups at `now` may reuse this entry.
	pub fn is_valid(&self, now: Instant) -> bool {
		now < self.valid_until
	}

	/// Whether a verification failure at `now` is allowed to expire this entry.
	pub fn can_invalidate_on_error(&self, now: Instant) -> bool {
		now > self.invalidate_on_error_until
	}

	/// Move the expiry back to the creation instant.
	pub fn expire(&mut self) {
		self.valid_until = self.created_at;
	}
}

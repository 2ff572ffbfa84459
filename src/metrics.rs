//! Per-cache telemetry counters and optional `metrics` facade recording.
//!
//! [`CacheMetrics`] is always available. With the `metrics` feature every lookup, invalidation,
//! token exchange, and profile lookup is also emitted through the `metrics` facade; the
//! `prometheus` feature adds a ready-made exporter.

// std
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "prometheus")] use std::sync::OnceLock;
// crates.io
#[cfg(feature = "metrics")] use metrics::Label;
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
#[cfg(feature = "metrics")] use smallvec::SmallVec;
// self
use crate::_prelude::*;

#[cfg(feature = "metrics")]
type LabelSet = SmallVec<[Label; 4]>;

#[cfg(feature = "metrics")]
const METRIC_VERIFIER_LOOKUPS_TOTAL: &str = "realm_auth_verifier_lookups_total";
#[cfg(feature = "metrics")]
const METRIC_VERIFIER_HITS_TOTAL: &str = "realm_auth_verifier_hits_total";
#[cfg(feature = "metrics")]
const METRIC_VERIFIER_INVALIDATIONS_TOTAL: &str = "realm_auth_verifier_invalidations_total";
#[cfg(feature = "metrics")]
const METRIC_TOKEN_EXCHANGES_TOTAL: &str = "realm_auth_token_exchanges_total";
#[cfg(feature = "metrics")]
const METRIC_PROFILE_LOOKUPS_TOTAL: &str = "realm_auth_profile_lookups_total";

/// Shared Prometheus handle installed by [`install_default_exporter`].
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Thread-safe counters for a single verifier cache.
#[derive(Debug, Default)]
pub struct CacheMetrics {
	lookups: AtomicU64,
	hits: AtomicU64,
	rebuilds: AtomicU64,
	invalidations: AtomicU64,
}
impl CacheMetrics {
	/// Create a new metrics accumulator.
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Record a lookup served from the cache.
	pub fn record_hit(&self) {
		self.lookups.fetch_add(1, Ordering::Relaxed);
		self.hits.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a lookup that required discovery.
	pub fn record_miss(&self) {
		self.lookups.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a newly stored verifier.
	pub fn record_rebuild(&self) {
		self.rebuilds.fetch_add(1, Ordering::Relaxed);
	}

	/// Record an early expiry triggered by a verification failure.
	pub fn record_invalidation(&self) {
		self.invalidations.fetch_add(1, Ordering::Relaxed);
	}

	/// Take a point-in-time snapshot for status reporting.
	pub fn snapshot(&self) -> CacheMetricsSnapshot {
		CacheMetricsSnapshot {
			lookups: self.lookups.load(Ordering::Relaxed),
			hits: self.hits.load(Ordering::Relaxed),
			rebuilds: self.rebuilds.load(Ordering::Relaxed),
			invalidations: self.invalidations.load(Ordering::Relaxed),
		}
	}
}

/// Read-only snapshot of [`CacheMetrics`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheMetricsSnapshot {
	/// Total verifier lookups.
	pub lookups: u64,
	/// Lookups served without discovery.
	pub hits: u64,
	/// Verifiers built and stored.
	pub rebuilds: u64,
	/// Entries expired early after a verification failure.
	pub invalidations: u64,
}
impl CacheMetricsSnapshot {
	/// Share of lookups served from the cache.
	pub fn hit_rate(&self) -> f64 {
		if self.lookups == 0 { 0.0 } else { self.hits as f64 / self.lookups as f64 }
	}
}

/// Install the default Prometheus recorder backed by `metrics`.
///
/// Multiple invocations are safe; subsequent calls become no-ops once the recorder is installed.
#[cfg(feature = "prometheus")]
pub fn install_default_exporter() -> Result<()> {
	if PROMETHEUS_HANDLE.get().is_some() {
		return Ok(());
	}

	let handle = PrometheusBuilder::new()
		.install_recorder()
		.map_err(|err| Error::Metrics(err.to_string()))?;
	let _ = PROMETHEUS_HANDLE.set(handle);

	Ok(())
}

/// Access the global Prometheus exporter handle when installed.
#[cfg(feature = "prometheus")]
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
	PROMETHEUS_HANDLE.get()
}

/// Record a verifier lookup for `realm` behind `issuer`.
pub fn record_verifier_lookup(issuer: &str, realm: &str, hit: bool) {
	#[cfg(feature = "metrics")]
	{
		let labels = realm_labels(issuer, realm);

		metrics::counter!(METRIC_VERIFIER_LOOKUPS_TOTAL, labels.iter()).increment(1);

		if hit {
			metrics::counter!(METRIC_VERIFIER_HITS_TOTAL, labels.iter()).increment(1);
		}
	}
	#[cfg(not(feature = "metrics"))]
	let _ = (issuer, realm, hit);
}

/// Record an early verifier expiry.
pub fn record_verifier_invalidation(issuer: &str, realm: &str) {
	#[cfg(feature = "metrics")]
	{
		let labels = realm_labels(issuer, realm);

		metrics::counter!(METRIC_VERIFIER_INVALIDATIONS_TOTAL, labels.iter()).increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	let _ = (issuer, realm);
}

/// Record a token endpoint exchange and whether it succeeded.
pub fn record_token_exchange(realm: &str, success: bool) {
	#[cfg(feature = "metrics")]
	{
		let mut labels = LabelSet::new();

		labels.push(Label::new("realm", realm.to_owned()));
		labels.push(Label::new("status", if success { "success" } else { "error" }));

		metrics::counter!(METRIC_TOKEN_EXCHANGES_TOTAL, labels.iter()).increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	let _ = (realm, success);
}

/// Record a profile lookup outcome (`hit`, `fetched`, `fallback`, or `error`).
pub fn record_profile_lookup(realm: &str, outcome: &'static str) {
	#[cfg(feature = "metrics")]
	{
		let mut labels = LabelSet::new();

		labels.push(Label::new("realm", realm.to_owned()));
		labels.push(Label::new("outcome", outcome));

		metrics::counter!(METRIC_PROFILE_LOOKUPS_TOTAL, labels.iter()).increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	let _ = (realm, outcome);
}

#[cfg(feature = "metrics")]
fn realm_labels(issuer: &str, realm: &str) -> LabelSet {
	let mut labels = LabelSet::with_capacity(2);

	labels.push(Label::new("issuer", issuer.to_owned()));
	labels.push(Label::new("realm", realm.to_owned()));

	labels
}

//! Multi-realm OIDC credential caching and routing: per-realm verifier caches with early
//! invalidation, service token acquisition and refresh, host-forwarded transports, and a
//! read-through user-profile cache.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cache;
pub mod config;
pub mod http;
pub mod issuer;
pub mod metrics;
pub mod oidc;
pub mod profile;
pub mod router;
pub mod security;
pub mod token;

mod deadline;
mod error;
mod gateway;
mod _prelude {
	pub use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

	pub use chrono::{DateTime, TimeDelta, Utc};
	pub use tokio::time::Instant;

	pub use crate::{Deadline, Error, Result};
}

pub use crate::{
	cache::{profile::ProfileCache, verifier::VerifierCache},
	config::{RealmConfig, VerifierSettings},
	deadline::Deadline,
	error::{Error, Result},
	gateway::{RealmGateway, RealmGatewayBuilder},
	issuer::{IssuerResolver, issuer_of},
	oidc::{AccessTokenClaims, DiscoveryDocument, RealmVerifier},
	profile::{
		DefaultProfileProvider, HttpProfileRetriever, ProfileRetriever, RealmSummary, UserProfile,
	},
	router::{RealmEntry, RealmRouter},
	token::{
		provider::{Credentials, ProvideToken, TokenProvider, TokenProviderConfig},
		secret::Secret,
		source::TokenSource,
	},
};
#[cfg(feature = "prometheus")]
pub use crate::metrics::install_default_exporter;

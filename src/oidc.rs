//! OIDC discovery and per-realm token verification.

pub mod discovery;
pub mod verifier;

pub use discovery::DiscoveryDocument;
pub use verifier::{AccessTokenClaims, RealmVerifier};

//! Per-realm caches: token verifiers and user profiles.

pub mod entry;
pub mod profile;
pub mod verifier;

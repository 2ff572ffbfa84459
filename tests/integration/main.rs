//! HTTP-level integration coverage driven through wiremock servers.

mod fixtures;
mod profiles;
mod tokens;
mod verification;

//! Refreshable token source bound to one realm's token endpoint.

// std
use std::fmt::{Debug, Formatter, Result as FmtResult};
// crates.io
use http::StatusCode;
use tokio::sync::Mutex;
use url::Url;
// self
use crate::{
	_prelude::*,
	http::{client, transport::HttpTransport},
	metrics,
	router::{self, RealmEntry},
	token::{
		dto::{TokenErrorResponse, TokenResponse},
		provider::{Credentials, TokenProviderConfig},
		secret::Secret,
	},
};

#[derive(Clone)]
struct CachedToken {
	access_token: Secret,
	renew_at: Instant,
	refresh_token: Option<Secret>,
	refresh_renew_at: Option<Instant>,
}
impl CachedToken {
	fn from_response(
		response: TokenResponse,
		issued_at: Instant,
		leeway: Duration,
		realm: &str,
	) -> Result<Self> {
		if response.access_token.is_empty() {
			return Err(endpoint_error(realm, None, "Response carries an empty access_token."));
		}

		let expires_in = response
			.expires_in
			.ok_or_else(|| endpoint_error(realm, None, "Response is missing expires_in."))?;
		let refresh_renew_at = response
			.refresh_expires_in
			.filter(|secs| *secs > 0)
			.map(|secs| renewal_point(issued_at, Duration::from_secs(secs), leeway));

		Ok(Self {
			access_token: response.access_token,
			renew_at: renewal_point(issued_at, Duration::from_secs(expires_in), leeway),
			refresh_token: response.refresh_token.filter(|token| !token.is_empty()),
			refresh_renew_at,
		})
	}

	fn is_valid(&self, now: Instant) -> bool {
		now < self.renew_at
	}

	fn usable_refresh_token(&self, now: Instant) -> Option<&Secret> {
		match (&self.refresh_token, self.refresh_renew_at) {
			(Some(token), Some(renew_at)) if now < renew_at => Some(token),
			_ => None,
		}
	}
}

/// Instant at which a credential living for `lifetime` is renewed.
///
/// The margin is capped at half the lifetime, so short-lived tokens are still reused.
fn renewal_point(issued_at: Instant, lifetime: Duration, leeway: Duration) -> Instant {
	issued_at + lifetime - leeway.min(lifetime / 2)
}

/// Caches one access token and renews it when it is about to expire.
///
/// Callers for the same source are serialised, so concurrent requests trigger one exchange.
pub struct TokenSource {
	realm: String,
	token_url: Url,
	credentials: Credentials,
	transport: Arc<dyn HttpTransport>,
	expiry_leeway: Duration,
	max_response_bytes: u64,
	state: Mutex<Option<CachedToken>>,
}
impl TokenSource {
	/// Create a source posting `credentials` to `token_url`.
	pub fn new(
		realm: impl Into<String>,
		token_url: Url,
		credentials: Credentials,
		transport: Arc<dyn HttpTransport>,
		expiry_leeway: Duration,
		max_response_bytes: u64,
	) -> Self {
		Self {
			realm: realm.into(),
			token_url,
			credentials,
			transport,
			expiry_leeway,
			max_response_bytes,
			state: Mutex::new(None),
		}
	}

	/// Source for the token endpoint of `config.realm` on the host serving `entry`.
	pub fn for_entry(
		entry: &RealmEntry,
		config: &TokenProviderConfig,
		transport: Arc<dyn HttpTransport>,
		max_response_bytes: u64,
	) -> Result<Self> {
		let token_url = router::realm_url(
			&entry.base_uri,
			&config.realm,
			&["protocol", "openid-connect", "token"],
		)?;

		Ok(Self::new(
			config.realm.clone(),
			token_url,
			config.credentials.clone(),
			transport,
			config.expiry_leeway,
			max_response_bytes,
		))
	}

	#[allow(missing_docs)]
	pub fn token_url(&self) -> &Url {
		&self.token_url
	}

	/// Current access token, renewed first when missing or about to expire.
	///
	/// A failed renewal is returned as-is and leaves the previously cached token in place.
	#[tracing::instrument(skip_all, fields(realm = %self.realm, token_url = %self.token_url))]
	pub async fn token(&self, deadline: Deadline) -> Result<String> {
		deadline
			.run(async {
				let mut state = self.state.lock().await;
				let now = Instant::now();

				if let Some(cached) = state.as_ref()
					&& cached.is_valid(now)
				{
					return Ok(cached.access_token.expose().to_owned());
				}

				let refresh_token = state
					.as_ref()
					.and_then(|cached| cached.usable_refresh_token(now))
					.cloned();
				let fresh = self.exchange(refresh_token.as_ref()).await;

				metrics::record_token_exchange(&self.realm, fresh.is_ok());

				let fresh = fresh.inspect_err(
					|err| tracing::warn!(error = %err, "token endpoint exchange failed"),
				)?;
				let token = fresh.access_token.expose().to_owned();

				*state = Some(fresh);

				Ok(token)
			})
			.await
	}

	async fn exchange(&self, refresh_token: Option<&Secret>) -> Result<CachedToken> {
		let fields: Vec<(&str, &str)> = match (&self.credentials, refresh_token) {
			(Credentials::Password { client_id, .. }, Some(refresh_token)) => vec![
				("grant_type", "refresh_token"),
				("client_id", client_id.as_str()),
				("refresh_token", refresh_token.expose()),
			],
			(Credentials::Password { username, password, client_id }, None) => vec![
				("grant_type", "password"),
				("client_id", client_id.as_str()),
				("username", username.as_str()),
				("password", password.expose()),
			],
			(Credentials::ClientCredentials { client_id, client_secret }, _) => vec![
				("grant_type", "client_credentials"),
				("client_id", client_id.as_str()),
				("client_secret", client_secret.expose()),
			],
		};

		tracing::debug!(grant_type = fields[0].1, "requesting token");

		let issued_at = Instant::now();
		let (status, body) = client::post_form(
			self.transport.as_ref(),
			&self.token_url,
			&fields,
			self.max_response_bytes,
		)
		.await
		.map_err(|err| match err {
			Error::Timeout => err,
			err => endpoint_error(&self.realm, None, err.to_string()),
		})?;

		if status == StatusCode::UNAUTHORIZED {
			return Err(endpoint_error(
				&self.realm,
				Some(status),
				"Technical user credentials are invalid.",
			));
		}
		if !status.is_success() {
			let reason = serde_json::from_slice::<TokenErrorResponse>(&body)
				.map(|error| error.reason())
				.unwrap_or_else(|_| format!("Unexpected HTTP status {status}."));

			return Err(endpoint_error(&self.realm, Some(status), reason));
		}

		let response = serde_json::from_slice::<TokenResponse>(&body).map_err(|err| {
			endpoint_error(&self.realm, Some(status), format!("Cannot decode token response: {err}."))
		})?;

		CachedToken::from_response(response, issued_at, self.expiry_leeway, &self.realm)
	}
}
impl Debug for TokenSource {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("TokenSource")
			.field("realm", &self.realm)
			.field("token_url", &self.token_url.as_str())
			.field("credentials", &self.credentials)
			.finish_non_exhaustive()
	}
}

fn endpoint_error(realm: &str, status: Option<StatusCode>, reason: impl Into<String>) -> Error {
	Error::TokenEndpoint { realm: realm.to_owned(), status, reason: reason.into() }
}

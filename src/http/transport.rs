//! Transport abstraction used for every outbound request.
//!
//! Caches and token sources only need "send this request, give me the response"; everything
//! protocol-specific is layered on top. Implementations must be shareable across tasks and return `Send` futures so
//! caches can hold them behind `Arc<dyn HttpTransport>`.

// crates.io
use http::{Request, Response};
use reqwest::{Client, redirect::Policy};
// self
use crate::_prelude::*;

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<Response<Vec<u8>>>> + 'a + Send>>;

/// Executes a fully-built HTTP request.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Send `request` and buffer the response body.
	fn execute(&self, request: Request<Vec<u8>>) -> TransportFuture<'_>;
}

/// Default transport backed by [`reqwest`].
///
/// Redirects are not followed: token and discovery endpoints answer directly, and a redirect would
/// bypass host forwarding.
#[derive(Clone, Debug)]
pub struct ReqwestTransport(Client);
impl ReqwestTransport {
	/// Build a transport with the given per-request timeout.
	pub fn new(timeout: Duration) -> Result<Self> {
		let client = Client::builder()
			.redirect(Policy::none())
			.user_agent(format!("realm-auth-cache/{}", env!("CARGO_PKG_VERSION")))
			.connect_timeout(timeout.min(Duration::from_secs(5)))
			.timeout(timeout)
			.build()?;

		Ok(Self(client))
	}

	/// Wrap an existing reqwest client.
	pub fn with_client(client: Client) -> Self {
		Self(client)
	}
}
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: Request<Vec<u8>>) -> TransportFuture<'_> {
		Box::pin(async move {
			let request = reqwest::Request::try_from(request)?;
			let response = self.0.execute(request).await?;
			let status = response.status();
			let headers = response.headers().clone();
			let body = response.bytes().await?.to_vec();
			let mut converted = Response::new(body);

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok::<_, Error>(converted)
		})
	}
}

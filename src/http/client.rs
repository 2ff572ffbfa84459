//! Request helpers for the few JSON documents the core reads itself.

// crates.io
use http::{
	Method, Request, Response, StatusCode,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use serde::de::DeserializeOwned;
use url::{Url, form_urlencoded};
// self
use crate::{_prelude::*, http::transport::HttpTransport};

const APPLICATION_JSON: &str = "application/json";
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// `GET` a JSON document, optionally with bearer authentication.
///
/// Non-success statuses become [`Error::HttpStatus`].
pub async fn get_json<T>(
	transport: &dyn HttpTransport,
	url: &Url,
	bearer: Option<&str>,
	max_response_bytes: u64,
) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut builder =
		Request::builder().method(Method::GET).uri(url.as_str()).header(ACCEPT, APPLICATION_JSON);

	if let Some(token) = bearer {
		builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
	}

	let start = Instant::now();
	let response = transport.execute(builder.body(Vec::new())?).await?;
	let status = response.status();

	tracing::debug!(%url, %status, elapsed = ?start.elapsed(), "json fetch complete");

	let body = guard_size(url, response, max_response_bytes)?;

	if !status.is_success() {
		return Err(Error::HttpStatus { status, url: url.clone(), body: lossy(&body) });
	}

	Ok(serde_json::from_slice(&body)?)
}

/// `POST` a form-encoded body and return the raw response for the caller to interpret.
///
/// The size guard is applied to the response body whatever its status.
pub async fn post_form(
	transport: &dyn HttpTransport,
	url: &Url,
	fields: &[(&str, &str)],
	max_response_bytes: u64,
) -> Result<(StatusCode, Vec<u8>)> {
	let body = form_urlencoded::Serializer::new(String::new()).extend_pairs(fields).finish();
	let request = Request::builder()
		.method(Method::POST)
		.uri(url.as_str())
		.header(CONTENT_TYPE, FORM_URLENCODED)
		.header(ACCEPT, APPLICATION_JSON)
		.body(body.into_bytes())?;
	let response = transport.execute(request).await?;
	let status = response.status();

	tracing::debug!(%url, %status, "form post complete");

	Ok((status, guard_size(url, response, max_response_bytes)?))
}

fn guard_size(url: &Url, response: Response<Vec<u8>>, limit: u64) -> Result<Vec<u8>> {
	let body = response.into_body();

	if body.len() as u64 > limit {
		return Err(Error::Security(format!(
			"Response from {url} is {size} bytes, exceeding the configured guard of {limit} bytes.",
			size = body.len()
		)));
	}

	Ok(body)
}

fn lossy(body: &[u8]) -> Option<String> {
	(!body.is_empty()).then(|| String::from_utf8_lossy(body).into_owned())
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::Value;
	// self
	use super::*;
	use crate::http::transport::stub::StubTransport;

	#[tokio::test]
	async fn json_documents_are_decoded_with_bearer_auth() {
		let stub = StubTransport::new();

		stub.route("/doc", StatusCode::OK, r#"{"answer":42}"#);

		let url = Url::parse("https://eu.example.com/doc").unwrap();
		let value: Value = get_json(stub.as_ref(), &url, Some("abc"), 1024).await.expect("json");

		assert_eq!(value["answer"], 42);

		let (_, headers) = stub.seen().pop().unwrap();

		assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer abc");
	}

	#[tokio::test]
	async fn error_statuses_and_oversized_bodies_are_rejected() {
		let stub = StubTransport::new();

		stub.route("/big", StatusCode::OK, "x".repeat(64));
		stub.route("/denied", StatusCode::FORBIDDEN, "nope");

		let big = Url::parse("https://eu.example.com/big").unwrap();
		let denied = Url::parse("https://eu.example.com/denied").unwrap();

		assert!(matches!(
			get_json::<Value>(stub.as_ref(), &big, None, 16).await,
			Err(Error::Security(_))
		));

		match get_json::<Value>(stub.as_ref(), &denied, None, 1024).await {
			Err(Error::HttpStatus { status, body, .. }) => {
				assert_eq!(status, StatusCode::FORBIDDEN);
				assert_eq!(body.as_deref(), Some("nope"));
			},
			other => panic!("unexpected result: {other:?}"),
		}
	}

	#[tokio::test]
	async fn forms_are_url_encoded() {
		let stub = StubTransport::new();

		stub.route_with("/token", |request| {
			let body = String::from_utf8(request.body().clone()).unwrap();

			(StatusCode::OK, body)
		});

		let url = Url::parse("https://eu.example.com/token").unwrap();
		let (status, body) =
			post_form(stub.as_ref(), &url, &[("grant_type", "password"), ("username", "a b&c")], 1024)
				.await
				.expect("post");

		assert_eq!(status, StatusCode::OK);
		assert_eq!(String::from_utf8(body).unwrap(), "grant_type=password&username=a+b%26c");
	}
}

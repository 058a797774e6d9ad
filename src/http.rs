//! Transport primitives for auth endpoints and protected API calls.
//!
//! The module exposes [`HttpTransport`], the crate's only dependency on an HTTP stack, along
//! with the [`HttpRequest`] / [`HttpResponse`] aliases every component speaks. Requests and
//! responses are plain [`http`] values with fully buffered bodies, so a failed request can be
//! cloned and replayed after a token refresh.

// crates.io
use http::header::AUTHORIZATION;
// self
use crate::{_prelude::*, auth::TokenSecret, error::TransportError};

/// Buffered outbound request.
pub type HttpRequest = http::Request<Vec<u8>>;
/// Buffered inbound response.
pub type HttpResponse = http::Response<Vec<u8>>;
/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks that can execute buffered requests.
///
/// Implementations must be `Send + Sync + 'static` so the refresh coordinator can move a
/// shared handle into its background task. Any response that arrives, whatever its status,
/// is returned as `Ok`; only transport failures map to [`TransportError`]. Credentialed
/// transports (cookie jars) are the implementation's concern.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and buffers the full response.
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// Returns a copy of `request` suitable for replaying. Extensions are not carried over.
pub fn clone_request(request: &HttpRequest) -> HttpRequest {
	let mut clone = http::Request::new(request.body().clone());

	*clone.method_mut() = request.method().clone();
	*clone.uri_mut() = request.uri().clone();
	*clone.version_mut() = request.version();
	*clone.headers_mut() = request.headers().clone();

	clone
}

/// Sets (or replaces) the `Authorization: Bearer` header on `request`.
pub fn attach_bearer(
	mut request: HttpRequest,
	token: &TokenSecret,
) -> Result<HttpRequest, crate::error::ConfigError> {
	request.headers_mut().insert(AUTHORIZATION, token.bearer()?);

	Ok(request)
}

/// Returns the bearer token carried by `request`, if any.
pub fn bearer_of(request: &HttpRequest) -> Option<&str> {
	request.headers().get(AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// The default client keeps a cookie store, which is how the refresh endpoint receives its
/// transport-level credential. Supply a custom client through
/// [`ReqwestHttpClient::with_client`] to change that.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds a client with a cookie store enabled.
	pub fn new() -> Result<Self, crate::error::ConfigError> {
		Ok(Self(ReqwestClient::builder().cookie_store(true).build()?))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestHttpClient {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let uri = request.uri().to_string();
			let request = reqwest::Request::try_from(request)
				.map_err(|e| TransportError::network(&uri, e))?;
			let response =
				client.execute(request).await.map_err(|e| TransportError::network(&uri, e))?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await.map_err(|e| TransportError::network(&uri, e))?;
			let mut converted = HttpResponse::new(body.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

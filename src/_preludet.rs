//! Convenience re-exports and fixtures shared by unit and integration tests; enabled via
//! `cfg(test)` or the `test` crate feature.

pub use crate::_prelude::*;

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use http::header::CONTENT_TYPE;
use tokio::sync::Semaphore;
// self
use crate::{
	config::SessionConfig,
	error::TransportError,
	flows::Navigator,
	http::{HttpRequest, HttpResponse, HttpTransport, TransportFuture},
};
#[cfg(feature = "reqwest")]
use crate::{flows::Session, http::ReqwestHttpClient, store::MemoryBackend};

type Handler = dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync;

/// Session type used by reqwest-backed integration tests.
#[cfg(feature = "reqwest")]
pub type ReqwestTestSession = Session<ReqwestHttpClient>;

/// Mints an unsigned three-segment token whose payload carries `sub`, `role` and `exp`.
pub fn mint_token(subject: &str, role: Option<&str>, expires_at: i64) -> String {
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
	let mut payload = serde_json::json!({ "sub": subject, "exp": expires_at });

	if let Some(role) = role {
		payload["role"] = role.into();
	}

	let payload = URL_SAFE_NO_PAD.encode(payload.to_string());

	format!("{header}.{payload}.signature")
}

/// Mints a token for `subject` expiring `lifetime` from now.
pub fn token_expiring_in(subject: &str, lifetime: Duration) -> String {
	mint_token(subject, None, (OffsetDateTime::now_utc() + lifetime).unix_timestamp())
}

/// Builds a JSON response with `status` and `body`.
pub fn json_response(status: u16, body: &serde_json::Value) -> HttpResponse {
	let mut response = HttpResponse::new(body.to_string().into_bytes());

	*response.status_mut() =
		http::StatusCode::from_u16(status).expect("Fixture status codes should be valid.");
	response
		.headers_mut()
		.insert(CONTENT_TYPE, http::HeaderValue::from_static("application/json"));

	response
}

/// Parses `api_base` into a default [`SessionConfig`].
pub fn test_config(api_base: &str) -> SessionConfig {
	SessionConfig::new(Url::parse(api_base).expect("Fixture API base should parse."))
		.expect("Fixture API base should be accepted.")
}

/// In-process transport that answers every request through a closure and records what it saw.
///
/// Requests to `auth/refresh` can be held back with [`ScriptedTransport::hold_refresh`] until
/// [`ScriptedTransport::release_refresh`] hands out a permit, which lets tests pile up
/// concurrent callers behind one in-flight refresh.
pub struct ScriptedTransport {
	handler: Box<Handler>,
	requests: Mutex<Vec<HttpRequest>>,
	refresh_gate: Option<Arc<Semaphore>>,
}
impl ScriptedTransport {
	/// Creates a transport that answers with `handler`.
	pub fn new<F>(handler: F) -> Self
	where
		F: 'static + Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync,
	{
		Self { handler: Box::new(handler), requests: Mutex::new(Vec::new()), refresh_gate: None }
	}

	/// Blocks refresh calls until permits are released.
	pub fn hold_refresh(mut self) -> Self {
		self.refresh_gate = Some(Arc::new(Semaphore::new(0)));

		self
	}

	/// Lets one held refresh call proceed.
	pub fn release_refresh(&self) {
		if let Some(gate) = &self.refresh_gate {
			gate.add_permits(1);
		}
	}

	/// Every request received so far, in arrival order.
	pub fn requests(&self) -> Vec<HttpRequest> {
		self.requests.lock().iter().map(crate::http::clone_request).collect()
	}

	/// Number of requests whose path ends with `suffix`.
	pub fn count(&self, suffix: &str) -> usize {
		self.requests.lock().iter().filter(|request| request.uri().path().ends_with(suffix)).count()
	}
}
impl HttpTransport for ScriptedTransport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			self.requests.lock().push(crate::http::clone_request(&request));

			let gate = self
				.refresh_gate
				.as_ref()
				.filter(|_| request.uri().path().ends_with("auth/refresh"));

			if let Some(gate) = gate {
				gate.acquire().await.expect("Refresh gate should stay open.").forget();
			}

			(self.handler)(&request)
		})
	}
}

/// Navigator that remembers every redirect it was asked to perform.
#[derive(Debug, Default)]
pub struct RecordingNavigator(Mutex<Vec<String>>);
impl RecordingNavigator {
	/// Notices passed to each redirect, in order.
	pub fn notices(&self) -> Vec<String> {
		self.0.lock().clone()
	}
}
impl Navigator for RecordingNavigator {
	fn redirect_to_login(&self, notice: &str) {
		self.0.lock().push(notice.to_owned());
	}
}

/// Builds a reqwest-backed session over an in-memory store for `api_base`.
#[cfg(feature = "reqwest")]
pub fn build_reqwest_test_session(api_base: &str) -> (ReqwestTestSession, Arc<RecordingNavigator>) {
	let navigator = Arc::new(RecordingNavigator::default());
	let session = Session::new(
		test_config(api_base),
		Arc::new(MemoryBackend::default()),
		navigator.clone(),
	)
	.expect("Test session should build.");

	(session, navigator)
}

//! Bearer attachment and one-shot replay of requests rejected with 401.

// self
use crate::{
	_prelude::*,
	api,
	flows::{RefreshCoordinator, RefreshOutcome, SessionTeardown},
	http::{HttpRequest, HttpResponse, HttpTransport, attach_bearer, clone_request},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::TokenStore,
};

/// Intercepts outgoing requests on behalf of the session.
///
/// Each request is sent with the stored access token. A 401 hands control to the
/// [`RefreshCoordinator`]; a fresh token replays the original request exactly once, while a
/// failed refresh tears the session down and surfaces [`Error::AuthorizationFailure`].
pub struct Gatekeeper<C>
where
	C: ?Sized + HttpTransport,
{
	http_client: Arc<C>,
	store: TokenStore,
	coordinator: RefreshCoordinator<C>,
	teardown: SessionTeardown,
}
impl<C> Gatekeeper<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a gatekeeper sending through `http_client`.
	pub fn new(
		http_client: Arc<C>,
		store: TokenStore,
		coordinator: RefreshCoordinator<C>,
		teardown: SessionTeardown,
	) -> Self {
		Self { http_client, store, coordinator, teardown }
	}

	/// Attaches the stored access token, expired or not. Without one the request is unchanged.
	pub fn prepare(&self, request: HttpRequest) -> Result<HttpRequest> {
		match self.store.access_token() {
			Some(token) => Ok(attach_bearer(request, &token)?),
			None => Ok(request),
		}
	}

	/// Inspects `response` to `original`, refreshing and replaying once on 401.
	///
	/// A response to the replayed request is returned as is, even another 401.
	pub async fn handle_response(
		&self,
		original: HttpRequest,
		response: HttpResponse,
	) -> Result<HttpResponse> {
		const KIND: FlowKind = FlowKind::Replay;

		if !api::is_authorization_failure(&response) {
			return Ok(response);
		}

		let status = response.status().as_u16();

		match self.coordinator.request_token().await {
			RefreshOutcome::Fresh(token) => {
				let span = FlowSpan::new(KIND, "handle_response");

				obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

				let replay = attach_bearer(original, &token)?;
				let result = span.instrument(self.http_client.execute(replay)).await;

				match &result {
					Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
					Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
				}

				result.map_err(Error::from)
			},
			RefreshOutcome::Failed(failure) => {
				self.teardown.tear_down(&failure);

				Err(Error::AuthorizationFailure { status, refresh: Some(failure.error) })
			},
		}
	}

	/// Sends `request` through [`Gatekeeper::prepare`] and [`Gatekeeper::handle_response`].
	pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
		let original = clone_request(&request);
		let response = self.http_client.execute(self.prepare(request)?).await?;

		self.handle_response(original, response).await
	}
}
impl<C> Clone for Gatekeeper<C>
where
	C: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			store: self.store.clone(),
			coordinator: self.coordinator.clone(),
			teardown: self.teardown.clone(),
		}
	}
}
impl<C> Debug for Gatekeeper<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gatekeeper")
			.field("store", &self.store)
			.field("coordinator", &self.coordinator)
			.finish()
	}
}

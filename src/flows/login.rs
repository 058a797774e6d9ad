// self
use crate::{
	_prelude::*,
	auth::Credential,
	flows::Session,
	http::HttpTransport,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl<C> Session<C>
where
	C: ?Sized + HttpTransport,
{
	/// Exchanges email and password for tokens and stores both.
	///
	/// The session signal reports [`Authenticated`](crate::signal::SessionState::Authenticated)
	/// before this returns.
	pub async fn login(&self, email: &str, password: &str) -> Result<Credential> {
		const KIND: FlowKind = FlowKind::Login;

		let span = FlowSpan::new(KIND, "login");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let credential = self.api().login(email, password).await?;

				self.store().set(&credential.access_token, credential.refresh_token.as_ref())?;

				Ok(credential)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Clears the local session, then notifies the server on a best-effort basis.
	///
	/// Local teardown never depends on the server: a failed logout call is only logged.
	pub async fn logout(&self) -> Result<()> {
		const KIND: FlowKind = FlowKind::Logout;

		let span = FlowSpan::new(KIND, "logout");
		let bearer = self.store().access_token();
		let cleared = self.store().clear();

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		match span.instrument(self.api().logout(bearer.as_ref())).await {
			Ok(()) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(e) => {
				obs::warn_flow(KIND, "logout call failed", &e);
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		cleared.map_err(Error::from)
	}
}

//! Optional observability helpers for session flows.
//!
//! # Feature Flags
//!
//! - `tracing` (default) emits spans named `bearer_session.flow` with `flow` and `stage`
//!   fields, plus warning events when a refresh fails, a response carries no token, or a
//!   best-effort call such as logout goes wrong.
//! - `metrics` increments the [`FLOW_COUNTER`] (`bearer_session_flow_total`) counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`. [`describe_flow_metrics`]
//!   publishes its unit and description.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Session flows observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Email/password login.
	Login,
	/// Best-effort logout plus local teardown.
	Logout,
	/// A single-flight refresh cycle.
	Refresh,
	/// Replay of a request rejected with 401.
	Replay,
	/// Proactive renewal timer activity.
	Renewal,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Login => "login",
			FlowKind::Logout => "logout",
			FlowKind::Refresh => "refresh",
			FlowKind::Replay => "replay",
			FlowKind::Renewal => "renewal",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

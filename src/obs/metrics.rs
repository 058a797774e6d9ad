// self
use crate::obs::{FlowKind, FlowOutcome};

/// Counter incremented once per recorded [`FlowOutcome`], labeled by `flow` and `outcome`.
pub const FLOW_COUNTER: &str = "bearer_session_flow_total";

/// Increments [`FLOW_COUNTER`] on the installed recorder; a no-op without the `metrics` feature.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(FLOW_COUNTER, "flow" => kind.as_str(), "outcome" => outcome.as_str())
		.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Publishes the unit and description of [`FLOW_COUNTER`] to the installed recorder.
///
/// Call once after installing a recorder so exporters can label the counter.
pub fn describe_flow_metrics() {
	#[cfg(feature = "metrics")]
	metrics::describe_counter!(
		FLOW_COUNTER,
		metrics::Unit::Count,
		"Session flow attempts and their results."
	);
}

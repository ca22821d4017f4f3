//! Optional observability helpers for session flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `token_relay.flow` with the `flow` and
//!   `stage` fields, plus debug/warn events for hint storage and refresh decisions.
//! - Enable `metrics` to increment the `token_relay_flow_total` counter for every
//!   attempt/success/failure/queued outcome, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Session flows observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// An API request routed through the interceptor pair.
	Request,
	/// The single-flight token refresh.
	Refresh,
	/// The startup bootstrap gate.
	Bootstrap,
	/// Session hint storage access.
	Hint,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Request => "request",
			FlowKind::Refresh => "refresh",
			FlowKind::Bootstrap => "bootstrap",
			FlowKind::Hint => "hint",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Caller parked behind an in-flight refresh.
	Queued,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
			FlowOutcome::Queued => "queued",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

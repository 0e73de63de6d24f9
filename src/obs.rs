//! Optional observability helpers for the request pipeline.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to wrap every token exchange and API call in a `halopsa_client.request`
//!   span (`stage`, `method`, `path`) and to emit events for 429 retries and throttle waits.
//! - Enable `metrics` to increment the `halopsa_client_request_total` counter for every
//!   attempt/success/failure, labeled by `stage` + `outcome`.

mod tracing;

pub use tracing::*;

// self
use crate::_prelude::*;

/// Pipeline stages observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
	/// Client-credentials exchange against the token endpoint.
	TokenExchange,
	/// Authenticated API call, including its 429 retries.
	Request,
}
impl Stage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Stage::TokenExchange => "token_exchange",
			Stage::Request => "request",
		}
	}

	/// Counts `outcome` against this stage on the global metrics recorder.
	///
	/// Compiles to nothing unless the `metrics` feature is enabled.
	pub fn record(self, outcome: Outcome) {
		#[cfg(feature = "metrics")]
		metrics::counter!(
			"halopsa_client_request_total",
			"stage" => self.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
		#[cfg(not(feature = "metrics"))]
		let _ = outcome;
	}
}
impl Display for Stage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Entry to a stage.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Attempt => "attempt",
			Outcome::Success => "success",
			Outcome::Failure => "failure",
		}
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

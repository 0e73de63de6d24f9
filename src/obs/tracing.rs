// self
use crate::{_prelude::*, obs::Stage};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedRequest<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedRequest<F> = F;

/// Span wrapping one pipeline stage.
#[derive(Clone, Debug)]
pub struct RequestSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl RequestSpan {
	/// Creates a new span tagged with the stage, HTTP method, and request path.
	pub fn new(stage: Stage, method: &str, path: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span =
				tracing::info_span!("halopsa_client.request", stage = stage.as_str(), method, path);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (stage, method, path);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedRequest<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits an event before sleeping ahead of a 429 retry.
pub fn record_retry(path: &str, attempt: u32, delay: Duration) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(path, attempt, delay_ms = delay.as_millis() as u64, "rate limited; retrying");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (path, attempt, delay);
	}
}

/// Emits an event before the limiter suspends a caller to stay under the throttle threshold.
pub fn record_throttle(delay: Duration, rate: f64) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(delay_ms = delay.as_millis() as u64, rate, "throttling until usage drops");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (delay, rate);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrument_passes_output_through() {
		let span = RequestSpan::new(Stage::Request, "GET", "/Tickets");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}

	#[test]
	fn events_noop_without_tracing() {
		record_retry("/Tickets", 0, Duration::from_secs(5));
		record_throttle(Duration::from_millis(250), 0.8);
	}
}

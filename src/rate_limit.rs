//! Rolling-window admission control and 429 backoff arithmetic.
//!
//! [`RateLimiter`] remembers when each request was sent and delays new requests once the share of
//! the quota used inside the rolling window reaches the throttle threshold. It never drops work:
//! callers sleep until enough timestamps age out. The retry helpers are pure functions of the
//! configuration so the orchestrator's backoff schedule is predictable.

// crates.io
use tokio::time::{self as tokio_time, Instant};
// self
use crate::{_prelude::*, config::RateLimitConfig, error::ConfigError, obs};

/// Upper bound applied to every computed retry delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Point-in-time view of quota usage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RateLimitStatus {
	/// Requests still available in the current window.
	pub remaining: u32,
	/// Used share of the quota, `count / max_requests`.
	pub rate: f64,
}

/// Shared quota tracker for one client instance.
#[derive(Debug)]
pub struct RateLimiter {
	config: RateLimitConfig,
	window: Mutex<UsageWindow>,
}
impl RateLimiter {
	/// Creates a limiter for the provided settings, rejecting ones that fail
	/// [`RateLimitConfig::validate`].
	pub fn new(config: RateLimitConfig) -> Result<Self, ConfigError> {
		config.validate()?;

		Ok(Self { config, window: Mutex::new(UsageWindow::default()) })
	}

	/// Settings this limiter enforces.
	pub fn config(&self) -> &RateLimitConfig {
		&self.config
	}

	/// Records that a request is being sent now.
	pub fn record_request(&self) {
		if !self.config.enabled {
			return;
		}

		let now = Instant::now();
		let mut window = self.window.lock();

		window.prune(now, self.config.window);
		window.stamps.push_back(now);
	}

	/// Requests still available in the current window (`max_requests` when disabled).
	pub fn remaining(&self) -> u32 {
		if !self.config.enabled {
			return self.config.max_requests;
		}

		self.config.max_requests.saturating_sub(self.live_count())
	}

	/// Used share of the quota; `0.0` when disabled.
	pub fn current_rate(&self) -> f64 {
		if !self.config.enabled {
			return 0.;
		}

		f64::from(self.live_count()) / f64::from(self.config.max_requests)
	}

	/// Snapshot of [`remaining`](Self::remaining) and [`current_rate`](Self::current_rate).
	pub fn status(&self) -> RateLimitStatus {
		RateLimitStatus { remaining: self.remaining(), rate: self.current_rate() }
	}

	/// Suspends until usage drops below the throttle threshold.
	///
	/// Returns immediately when the limiter is disabled or usage is already below the threshold.
	pub async fn wait_for_slot(&self) {
		if !self.config.enabled {
			return;
		}

		while let Some(delay) = self.throttle_delay(Instant::now()) {
			obs::record_throttle(delay, self.current_rate());
			tokio_time::sleep(delay).await;
		}
	}

	/// Backoff for the given zero-based retry attempt: `retry_after * 2^attempt`, capped at
	/// [`MAX_RETRY_DELAY`].
	pub fn calculate_retry_delay(&self, attempt: u32) -> Duration {
		let factor = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);

		self.config
			.retry_after
			.checked_mul(factor)
			.map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
	}

	/// Whether another retry is permitted after `attempt` retries.
	pub fn should_retry(&self, attempt: u32) -> bool {
		attempt < self.config.max_retries
	}

	/// Interprets a `Retry-After` header expressed in (possibly fractional) seconds.
	///
	/// Falls back to the configured `retry_after` when the header is absent, empty, negative, or
	/// not a number.
	pub fn parse_retry_after(&self, header: Option<&str>) -> Duration {
		header
			.map(str::trim)
			.filter(|raw| !raw.is_empty())
			.and_then(|raw| raw.parse::<f64>().ok())
			.filter(|secs| secs.is_finite() && *secs >= 0.)
			.and_then(|secs| Duration::try_from_secs_f64(secs).ok())
			.unwrap_or(self.config.retry_after)
	}

	fn live_count(&self) -> u32 {
		let count = self.window.lock().live_count(Instant::now(), self.config.window);

		u32::try_from(count).unwrap_or(u32::MAX)
	}

	fn throttle_delay(&self, now: Instant) -> Option<Duration> {
		let mut window = self.window.lock();

		window.prune(now, self.config.window);

		let count = window.stamps.len();
		let max = f64::from(self.config.max_requests);

		if (count as f64) / max < self.config.throttle_threshold {
			return None;
		}

		let admissible = admissible_count(self.config.max_requests, self.config.throttle_threshold);
		// Once this stamp ages out, usage falls back under the threshold.
		let pivot = count.checked_sub(admissible + 1).and_then(|index| window.stamps.get(index))?;

		Some((*pivot + self.config.window).saturating_duration_since(now))
	}
}

#[derive(Debug, Default)]
struct UsageWindow {
	stamps: VecDeque<Instant>,
}
impl UsageWindow {
	fn prune(&mut self, now: Instant, window: Duration) {
		while let Some(oldest) = self.stamps.front() {
			if now.saturating_duration_since(*oldest) < window {
				break;
			}

			self.stamps.pop_front();
		}
	}

	fn live_count(&self, now: Instant, window: Duration) -> usize {
		self.stamps.iter().filter(|stamp| now.saturating_duration_since(**stamp) < window).count()
	}
}

/// Largest request count whose rate stays strictly below `threshold`.
fn admissible_count(max_requests: u32, threshold: f64) -> usize {
	let max = f64::from(max_requests);
	let below = |n: u32| f64::from(n) / max < threshold;
	let mut n = ((threshold * max).ceil() as u32).min(max_requests);

	while n > 0 && !below(n) {
		n -= 1;
	}
	while n < max_requests && below(n + 1) {
		n += 1;
	}

	n as usize
}

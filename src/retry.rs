//! Bounded exponential backoff shared by the token exchange and the mail send.

// self
use crate::{_prelude::*, obs::FlowKind};

/// Boxed future returned by [`Sleep::sleep`].
pub type SleepFuture<'a> = Pin<Box<dyn Future<Output = ()> + 'a + Send>>;

/// Suspends the calling task between retry attempts.
///
/// Injected so tests can record the requested delays instead of waiting them out.
pub trait Sleep
where
	Self: Send + Sync,
{
	/// Waits for `duration` without blocking other tasks.
	fn sleep(&self, duration: Duration) -> SleepFuture<'_>;
}

/// [`Sleep`] implementation backed by the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleep;
impl Sleep for TokioSleep {
	fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
		let duration = std::time::Duration::try_from(duration).unwrap_or_default();

		Box::pin(tokio::time::sleep(duration))
	}
}

/// Attempt ceiling plus the base of the `base * 2^(attempt-1)` delay schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	max_attempts: u32,
	base_delay: Duration,
}
impl RetryPolicy {
	/// Default attempt ceiling.
	pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
	/// Default delay before the second attempt.
	pub const DEFAULT_BASE_DELAY: Duration = Duration::SECOND;

	/// Creates a policy; at least one attempt is always made and negative delays become zero.
	pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
		Self {
			max_attempts: max_attempts.max(1),
			base_delay: if base_delay.is_negative() { Duration::ZERO } else { base_delay },
		}
	}

	/// Returns the attempt ceiling.
	pub fn max_attempts(&self) -> u32 {
		self.max_attempts
	}

	/// Delay to wait after the failed `attempt` (1-based) before the next one.
	pub fn backoff(&self, attempt: u32) -> Duration {
		let exponent = attempt.saturating_sub(1).min(30);

		self.base_delay.saturating_mul(1_i32 << exponent)
	}

	/// Runs `operation` until it succeeds or the attempt ceiling is reached, retrying every
	/// error.
	pub async fn run<T, F, Fut>(
		&self,
		kind: FlowKind,
		sleeper: &dyn Sleep,
		mut operation: F,
	) -> Result<T, RetryExhausted>
	where
		F: FnMut(u32) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let mut attempt = 1;

		loop {
			match operation(attempt).await {
				Ok(value) => return Ok(value),
				Err(err) if attempt < self.max_attempts => {
					let delay = self.backoff(attempt);

					crate::obs::retry_scheduled(kind, attempt, self.max_attempts, delay, &err);
					sleeper.sleep(delay).await;

					attempt += 1;
				},
				Err(last_error) => return Err(RetryExhausted { attempts: attempt, last_error }),
			}
		}
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self::new(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_BASE_DELAY)
	}
}

/// Final failure reported by [`RetryPolicy::run`].
#[derive(Debug)]
pub struct RetryExhausted {
	/// Attempts performed.
	pub attempts: u32,
	/// Error from the last attempt.
	pub last_error: Error,
}

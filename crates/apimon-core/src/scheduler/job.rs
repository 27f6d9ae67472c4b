//! Retry policy for the scheduler's own jobs.
//!
//! Aggregation and cleanup don't go through an external task-queue library;
//! each is a plain async closure retried by `run_with_retry` against an
//! explicit `RetryPolicy` value, driven by the scheduler's own loop.

use std::future::Future;
use std::time::Duration;

/// Exponential backoff: `base * 2^(attempt - 1)`, capped at `max_attempts`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self { base_delay, max_attempts }
    }

    /// The delay to sleep before attempt number `attempt` (1-indexed).
    /// `attempt == 1` has no preceding delay.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = attempt - 2;
        self.base_delay.saturating_mul(1u32 << exponent.min(16))
    }
}

/// Run `attempt` repeatedly against `try_once` until it succeeds or the
/// retry policy's attempt budget is exhausted, sleeping with exponential
/// backoff between attempts.
///
/// Returns `Ok(output)` on the first success, or the final attempt's error
/// once `max_attempts` is reached.
pub async fn run_with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut try_once: F) -> Result<T, (u32, E)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        let delay = policy.delay_before(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match try_once().await {
            Ok(output) => return Ok(output),
            Err(e) => {
                if attempt >= policy.max_attempts {
                    return Err((attempt, e));
                }
                attempt += 1;
            }
        }
    }
}

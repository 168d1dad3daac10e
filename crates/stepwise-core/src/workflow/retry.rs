//! Bounded fixed-delay retry around a single step attempt.
//!
//! `max_attempts` counts additional tries after the first failure, so a
//! step with `retry: { max_attempts: 3 }` is attempted at most four times.
//! Retries never re-run earlier steps, and a cancelled execution is never
//! retried. The inter-attempt sleep is interrupted by cancellation.

use std::future::Future;
use std::time::Duration;

use stepwise_types::workflow::RetryPolicy;
use tokio_util::sync::CancellationToken;

use super::step_runner::StepError;

// ---------------------------------------------------------------------------
// RetryHandler
// ---------------------------------------------------------------------------

/// Stateless retry handler for workflow step failures.
pub struct RetryHandler;

impl RetryHandler {
    /// Total attempts allowed, including the first.
    pub fn total_attempts(policy: Option<&RetryPolicy>) -> u32 {
        1 + policy.map_or(0, |p| p.max_attempts)
    }

    /// Determine whether another attempt should be made.
    ///
    /// `attempt` is 1-based (first execution is attempt 1).
    pub fn should_retry(policy: Option<&RetryPolicy>, attempt: u32, error: &StepError) -> bool {
        !error.is_cancelled() && attempt < Self::total_attempts(policy)
    }

    /// Fixed delay between attempts.
    pub fn delay(policy: Option<&RetryPolicy>) -> Duration {
        Duration::from_millis(policy.map_or(0, |p| p.delay))
    }

    /// Drive `attempt_fn` until it succeeds, the policy is exhausted, or
    /// `cancel` fires.
    ///
    /// Returns the final outcome together with the number of attempts made.
    pub async fn run<T, F, Fut>(
        policy: Option<&RetryPolicy>,
        cancel: &CancellationToken,
        mut attempt_fn: F,
    ) -> (Result<T, StepError>, u32)
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, StepError>>,
    {
        let total = Self::total_attempts(policy);
        let mut attempt = 1;

        loop {
            let error = match attempt_fn(attempt).await {
                Ok(value) => return (Ok(value), attempt),
                Err(error) => error,
            };

            if !Self::should_retry(policy, attempt, &error) {
                return (Err(error), attempt);
            }

            let delay = Self::delay(policy);
            tracing::warn!(
                attempt,
                max_attempts = total,
                delay_ms = delay.as_millis() as u64,
                %error,
                "step attempt failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return (Err(StepError::Cancelled), attempt),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

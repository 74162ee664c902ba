//! Cancellable retry with exponential backoff
//!
//! [`RetryExecutor`] knows nothing about revisions or fan-out: it runs one
//! fallible async operation until it succeeds, the attempt budget or total
//! duration budget is spent, or the supplied [`CancelSignal`] fires. Every
//! failure is retried the same way; there is no transient/permanent split.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use crate::cancel::CancelSignal;
use crate::metrics;

/// Backoff parameters shared by every read of a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts including the first one
    pub max_attempts: u32,

    /// Delay after the first failure
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,

    /// Upper bound for a single delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// No sleep is started that would end past this budget
    #[serde(with = "humantime_serde")]
    pub max_total_duration: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            max_total_duration: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay slept after failed attempt `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let mut delay = self.base_delay;
        for _ in 1..attempt {
            delay = delay.saturating_mul(2).min(self.max_delay);
        }
        delay.min(self.max_delay)
    }

    /// Upper bound on total sleep across all attempts
    pub fn max_total_backoff(&self) -> Duration {
        let sleeps: Duration = (1..self.max_attempts.max(1))
            .map(|attempt| self.delay_for_attempt(attempt))
            .sum();
        sleeps.min(self.max_total_duration)
    }
}

/// Outcome of an operation that never succeeded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    #[error("operation cancelled")]
    Cancelled,

    #[error("gave up after {attempts} attempt(s)")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },
}

/// Runs an operation under a [`RetryPolicy`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Run `operation` until it succeeds or the policy gives up
    ///
    /// Cancellation is checked before every attempt and races each attempt
    /// and each backoff sleep, so a cancelled caller is released without
    /// waiting out a delay.
    pub async fn execute<T, E, F, Fut>(
        &self,
        cancel: &CancelSignal,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let started = Instant::now();
        let mut delay = self.policy.base_delay.min(self.policy.max_delay);
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }
            attempt += 1;

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                result = operation() => result,
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if attempt >= max_attempts {
                return Err(RetryError::Exhausted { attempts: attempt, source: err });
            }
            if started.elapsed() + delay > self.policy.max_total_duration {
                debug!(attempt, elapsed = ?started.elapsed(), "Retry budget spent");
                return Err(RetryError::Exhausted { attempts: attempt, source: err });
            }

            debug!(attempt, ?delay, error = %err, "Attempt failed, backing off");
            metrics::read_retried();

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            delay = delay.saturating_mul(2).min(self.policy.max_delay);
        }
    }
}

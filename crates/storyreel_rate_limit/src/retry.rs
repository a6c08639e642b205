//! Bounded retry with exponential backoff and per-attempt deadlines.

use crate::RateLimiter;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use storyreel_error::{
    ConfigError, GenerationError, GenerationErrorKind, RetryableError, StoryreelError,
};
use tokio_retry2::strategy::{ExponentialBackoff, jitter};
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, warn};

/// How many times, and how patiently, to attempt one logical call.
///
/// `max_attempts` counts every attempt including the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts including the first
    max_attempts: u32,
    /// Delay before the first retry
    initial_backoff_ms: u64,
    /// Backoff multiplier
    factor: u64,
    /// Upper bound for any single delay
    max_backoff_ms: u64,
    /// Randomize delays
    jitter: bool,
    /// Deadline for each attempt
    call_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff_ms: 1000,
            factor: 2,
            max_backoff_ms: 30_000,
            jitter: true,
            call_timeout_ms: 120_000,
        }
    }
}

/// The last error of a call that never succeeded, with the attempts spent on it.
#[derive(Debug, derive_more::Display)]
#[display("{} (after {} attempts)", error, attempts)]
pub struct RetryFailure {
    /// Attempts made
    pub attempts: u32,
    /// Error from the final attempt
    pub error: StoryreelError,
}

impl RetryFailure {
    /// Whether the final error was transient, meaning the budget ran out.
    pub fn exhausted(&self) -> bool {
        self.error.is_retryable()
    }
}

impl RetryPolicy {
    /// Create a policy with explicit values.
    pub fn new(
        max_attempts: u32,
        initial_backoff_ms: u64,
        max_backoff_ms: u64,
        call_timeout_ms: u64,
    ) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms,
            factor: 2,
            max_backoff_ms,
            jitter: true,
            call_timeout_ms,
        }
    }

    /// Replace the attempt budget.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Disable jitter (deterministic delays).
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Check the policy is usable.
    #[track_caller]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts", "must be at least 1"));
        }
        if self.call_timeout_ms == 0 {
            return Err(ConfigError::invalid("call_timeout_ms", "must be positive"));
        }
        if self.factor == 0 {
            return Err(ConfigError::invalid("factor", "must be positive"));
        }
        Ok(())
    }

    fn delays(&self) -> Vec<Duration> {
        let retries = self.max_attempts.saturating_sub(1) as usize;
        let backoff = ExponentialBackoff::from_millis(self.initial_backoff_ms.max(1))
            .factor(self.factor.max(1))
            .max_delay(Duration::from_millis(self.max_backoff_ms.max(1)));
        if self.jitter {
            backoff.map(jitter).take(retries).collect()
        } else {
            backoff.take(retries).collect()
        }
    }

    /// Run `operation` until it succeeds, fails permanently or the budget is spent.
    ///
    /// Each attempt is bounded by `call_timeout_ms`; an elapsed deadline counts as a
    /// transient `Timeout`. Attempts never reuse state from earlier attempts, so
    /// `operation` must build its request from scratch each time.
    ///
    /// # Errors
    ///
    /// Returns [`RetryFailure`] carrying the last error and the attempts made.
    pub async fn run<T, F, Fut>(&self, label: &str, operation: F) -> Result<T, RetryFailure>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StoryreelError>>,
    {
        self.attempt(label, None, operation).await
    }

    /// Like [`run`](Self::run), but each attempt first waits for a `limiter` slot.
    ///
    /// The deadline starts once the slot is held, so time spent queued behind the
    /// rate limit never uses up an attempt. The slot is released when the attempt
    /// ends, including before any backoff delay.
    ///
    /// # Errors
    ///
    /// Returns [`RetryFailure`] carrying the last error and the attempts made.
    pub async fn run_limited<T, F, Fut>(
        &self,
        label: &str,
        limiter: &RateLimiter,
        operation: F,
    ) -> Result<T, RetryFailure>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StoryreelError>>,
    {
        self.attempt(label, Some(limiter), operation).await
    }

    async fn attempt<T, F, Fut>(
        &self,
        label: &str,
        limiter: Option<&RateLimiter>,
        operation: F,
    ) -> Result<T, RetryFailure>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StoryreelError>>,
    {
        let deadline = Duration::from_millis(self.call_timeout_ms);
        let max_backoff_ms = self.max_backoff_ms;
        let mut attempts = 0u32;

        let result = Retry::spawn(self.delays(), || {
            attempts += 1;
            let attempt = attempts;
            let operation = &operation;
            async move {
                let _slot = match limiter {
                    Some(limiter) => Some(limiter.acquire().await.map_err(RetryError::Permanent)?),
                    None => None,
                };
                let outcome = match tokio::time::timeout(deadline, operation()).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(GenerationError::new(GenerationErrorKind::Timeout {
                        operation: label.to_string(),
                        after_ms: deadline.as_millis() as u64,
                    })
                    .into()),
                };
                match outcome {
                    Ok(value) => {
                        debug!(label, attempt, "Call succeeded");
                        Ok(value)
                    }
                    Err(e) if e.is_retryable() => {
                        warn!(label, attempt, error = %e, "Transient error, will retry");
                        let hint = e.min_backoff_ms().min(max_backoff_ms);
                        Err(RetryError::Transient {
                            err: e,
                            retry_after: (hint > 0).then(|| Duration::from_millis(hint)),
                        })
                    }
                    Err(e) => {
                        warn!(label, attempt, error = %e, "Permanent error, failing immediately");
                        Err(RetryError::Permanent(e))
                    }
                }
            }
        })
        .await;

        result.map_err(|error| RetryFailure { attempts, error })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_count_matches_budget() {
        let policy = RetryPolicy::new(4, 10, 50, 1000).without_jitter();
        let delays = policy.delays();
        assert_eq!(delays.len(), 3);
        assert!(delays.iter().all(|d| *d <= Duration::from_millis(50)));
        assert!(RetryPolicy::new(1, 10, 50, 1000).delays().is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        assert!(RetryPolicy::default().with_max_attempts(0).validate().is_err());
        assert!(RetryPolicy::default().validate().is_ok());
    }
}

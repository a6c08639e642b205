//! Rate limiter built on governor and a Tokio semaphore.
//!
//! - Governor (GCRA) enforces requests per minute
//! - A semaphore enforces the number of in-flight calls

use derive_getters::Getters;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use storyreel_error::{GenerationError, GenerationErrorKind, StoryreelResult};
use tokio::sync::Semaphore;

type DirectRateLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Limits for one backend. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct LimitConfig {
    /// Requests per minute
    rpm: Option<u32>,
    /// Maximum concurrent requests
    max_concurrent: Option<u32>,
}

impl LimitConfig {
    /// Create a limit configuration.
    pub fn new(rpm: Option<u32>, max_concurrent: Option<u32>) -> Self {
        Self {
            rpm,
            max_concurrent,
        }
    }
}

/// Shared rate limiter for one backend.
///
/// Clones share the same quota.
///
/// # Example
///
/// ```rust,no_run
/// use storyreel_rate_limit::{LimitConfig, RateLimiter};
///
/// # async fn example() {
/// let limiter = RateLimiter::new(LimitConfig::new(Some(60), Some(2)));
/// let guard = limiter.acquire().await.unwrap();
/// // call the backend...
/// drop(guard);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RateLimiter {
    rpm_limiter: Option<Arc<DirectRateLimiter>>,
    concurrent_semaphore: Arc<Semaphore>,
}

impl RateLimiter {
    /// Create a rate limiter from limits.
    pub fn new(config: LimitConfig) -> Self {
        let rpm_limiter = config.rpm.and_then(|rpm| {
            NonZeroU32::new(rpm).map(|n| Arc::new(GovernorRateLimiter::direct(Quota::per_minute(n))))
        });

        let max_concurrent = config
            .max_concurrent
            .filter(|n| *n > 0)
            .map(|n| n as usize)
            .unwrap_or(Semaphore::MAX_PERMITS);

        Self {
            rpm_limiter,
            concurrent_semaphore: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// A limiter that never waits.
    pub fn unlimited() -> Self {
        Self::new(LimitConfig::default())
    }

    /// Wait until both the rate and the concurrency limit allow a call.
    ///
    /// Returns a guard that releases the concurrency slot when dropped.
    pub async fn acquire(&self) -> StoryreelResult<RateLimiterGuard> {
        if let Some(limiter) = &self.rpm_limiter {
            limiter.until_ready().await;
        }

        // Concurrency last so the slot is not held while waiting for quota.
        let permit = self
            .concurrent_semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| {
                GenerationError::new(GenerationErrorKind::BackendUnavailable(
                    "rate limiter closed".to_string(),
                ))
            })?;

        Ok(RateLimiterGuard { _permit: permit })
    }
}

/// RAII guard for the concurrency slot.
#[derive(Debug)]
pub struct RateLimiterGuard {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

//! Retry policy and rate limiting for storyreel generation backends.
//!
//! - [`RetryPolicy`] bounds the attempts for one logical call, applies exponential
//!   backoff with jitter between attempts and a deadline to each attempt.
//! - [`RateLimiter`] enforces per-backend requests-per-minute and concurrency limits.
//!
//! # Example
//!
//! ```rust,no_run
//! use storyreel_rate_limit::RetryPolicy;
//! use storyreel_error::StoryreelResult;
//!
//! # async fn call_backend() -> StoryreelResult<String> { Ok("ok".into()) }
//! # async fn example() {
//! let policy = RetryPolicy::default();
//! let text = policy.run("prose", || call_backend()).await;
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod limiter;
mod retry;

pub use limiter::{LimitConfig, RateLimiter, RateLimiterGuard};
pub use retry::{RetryFailure, RetryPolicy};

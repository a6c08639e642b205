//! Generation backend errors and retry classification.

/// Failure conditions reported by text, image and speech backends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum GenerationErrorKind {
    /// Backend rejected the call because of quota or request rate
    #[display("Rate limited: {}", _0)]
    RateLimited(String),
    /// Backend could not be reached or reported itself unavailable
    #[display("Backend unavailable: {}", _0)]
    BackendUnavailable(String),
    /// Backend refused the prompt (content policy, malformed prompt)
    #[display("Invalid prompt: {}", _0)]
    InvalidPrompt(String),
    /// Request failed validation before it was sent
    #[display("Invalid input: {}", _0)]
    InvalidInput(String),
    /// Backend answered but produced nothing usable
    #[display("Empty output from {}", _0)]
    EmptyOutput(String),
    /// Backend answered with a body that could not be decoded
    #[display("Malformed response: {}", _0)]
    MalformedResponse(String),
    /// HTTP error with status code and message
    #[display("HTTP {} error: {}", status_code, message)]
    Http {
        /// HTTP status code
        status_code: u16,
        /// Error message
        message: String,
    },
    /// A single call exceeded its deadline
    #[display("{} call timed out after {}ms", operation, after_ms)]
    Timeout {
        /// Name of the operation that timed out
        operation: String,
        /// Deadline in milliseconds
        after_ms: u64,
    },
    /// The chapter was cancelled before the call was issued
    #[display("Cancelled before {}", _0)]
    Cancelled(String),
    /// Credentials for a backend were not configured
    #[display("Missing API key: environment variable {} is not set", _0)]
    MissingApiKey(String),
}

impl GenerationErrorKind {
    /// Check if this error type should be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationErrorKind::RateLimited(_)
            | GenerationErrorKind::BackendUnavailable(_)
            | GenerationErrorKind::EmptyOutput(_)
            | GenerationErrorKind::MalformedResponse(_)
            | GenerationErrorKind::Timeout { .. } => true,
            GenerationErrorKind::Http { status_code, .. } => {
                matches!(*status_code, 408 | 429 | 500 | 502 | 503 | 504)
            }
            GenerationErrorKind::InvalidPrompt(_)
            | GenerationErrorKind::InvalidInput(_)
            | GenerationErrorKind::Cancelled(_)
            | GenerationErrorKind::MissingApiKey(_) => false,
        }
    }

    /// Minimum delay before the next attempt, in milliseconds.
    ///
    /// Rate-limit responses ask for a longer pause than the policy's
    /// exponential schedule would give on the first retries.
    pub fn min_backoff_ms(&self) -> u64 {
        match self {
            GenerationErrorKind::RateLimited(_) => 2000,
            GenerationErrorKind::Http { status_code: 429, .. } => 2000,
            _ => 0,
        }
    }
}

/// Generation error with source location tracking.
///
/// # Examples
///
/// ```
/// use storyreel_error::{GenerationError, GenerationErrorKind, RetryableError};
///
/// let err = GenerationError::new(GenerationErrorKind::BackendUnavailable(
///     "connection refused".to_string(),
/// ));
/// assert!(err.is_retryable());
///
/// let err = GenerationError::new(GenerationErrorKind::InvalidPrompt("blocked".to_string()));
/// assert!(!err.is_retryable());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Generation Error: {} at line {} in {}", kind, line, file)]
pub struct GenerationError {
    /// The kind of error that occurred
    pub kind: GenerationErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl GenerationError {
    /// Create a new GenerationError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: GenerationErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Classify an HTTP status into the matching generation error.
    #[track_caller]
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = match status_code {
            429 => GenerationErrorKind::RateLimited(message),
            400 | 422 => GenerationErrorKind::InvalidPrompt(message),
            502..=504 => GenerationErrorKind::BackendUnavailable(message),
            _ => GenerationErrorKind::Http {
                status_code,
                message,
            },
        };
        Self::new(kind)
    }
}

/// Trait for errors that support retry logic.
///
/// # Examples
///
/// ```
/// use storyreel_error::{GenerationError, GenerationErrorKind, RetryableError};
///
/// let err = GenerationError::new(GenerationErrorKind::RateLimited("429".to_string()));
/// assert!(err.is_retryable());
/// assert_eq!(err.min_backoff_ms(), 2000);
/// ```
pub trait RetryableError {
    /// Returns true if this error should trigger another attempt.
    ///
    /// Transient conditions (unavailable backend, rate limit, timeout) return true.
    /// Permanent conditions (rejected prompt, invalid request) return false.
    fn is_retryable(&self) -> bool;

    /// Lower bound for the delay before the next attempt.
    fn min_backoff_ms(&self) -> u64 {
        0
    }
}

impl RetryableError for GenerationError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    fn min_backoff_ms(&self) -> u64 {
        self.kind.min_backoff_ms()
    }
}

//! Top-level error wrapper types.

use crate::{
    BuilderError, CompositionError, CompositionErrorKind, ConfigError, ConsistencyError,
    ConsistencyErrorKind, GenerationError, JsonError, RetryableError, StorageError,
};

/// Coarse classification used to decide how a failure is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ErrorCategory {
    /// External generation call failed; retried per policy
    #[display("generation")]
    Generation,
    /// Artifacts disagree with each other; never retried automatically
    #[display("consistency")]
    Consistency,
    /// Disk, muxer or size limit failure; fatal for the chapter
    #[display("resource")]
    Resource,
    /// Invalid configuration or request construction
    #[display("configuration")]
    Configuration,
}

/// Aggregates every domain error in the workspace.
///
/// # Examples
///
/// ```
/// use storyreel_error::{ConfigError, StoryreelError};
///
/// let err: StoryreelError = ConfigError::invalid("output_dir", "must not be empty").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum StoryreelErrorKind {
    /// Generation backend error
    #[from(GenerationError)]
    Generation(GenerationError),
    /// Cross-modal consistency error
    #[from(ConsistencyError)]
    Consistency(ConsistencyError),
    /// Artifact storage error
    #[from(StorageError)]
    Storage(StorageError),
    /// Composite assembly error
    #[from(CompositionError)]
    Composition(CompositionError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// JSON serialization/deserialization error
    #[from(JsonError)]
    Json(JsonError),
    /// Builder error
    #[from(BuilderError)]
    Builder(BuilderError),
}

/// Storyreel error with kind discrimination.
///
/// # Examples
///
/// ```
/// use storyreel_error::{StorageError, StorageErrorKind, StoryreelResult};
///
/// fn load_prose() -> StoryreelResult<String> {
///     Err(StorageError::new(StorageErrorKind::NotFound("ch001_prose.txt".into())))?
/// }
///
/// assert!(load_prose().is_err());
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Storyreel Error: {}", _0)]
pub struct StoryreelError(Box<StoryreelErrorKind>);

impl StoryreelError {
    /// Create a new error from a kind.
    pub fn new(kind: StoryreelErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &StoryreelErrorKind {
        &self.0
    }

    /// Map the error onto the failure taxonomy.
    pub fn category(&self) -> ErrorCategory {
        match self.kind() {
            StoryreelErrorKind::Generation(_) => ErrorCategory::Generation,
            StoryreelErrorKind::Consistency(_) => ErrorCategory::Consistency,
            StoryreelErrorKind::Composition(e) => match e.kind {
                CompositionErrorKind::NonPositiveDuration(_) | CompositionErrorKind::NotReady(_) => {
                    ErrorCategory::Consistency
                }
                CompositionErrorKind::ChapterTooLong { .. } | CompositionErrorKind::Muxer(_) => {
                    ErrorCategory::Resource
                }
            },
            StoryreelErrorKind::Storage(_) | StoryreelErrorKind::Json(_) => ErrorCategory::Resource,
            StoryreelErrorKind::Config(_) | StoryreelErrorKind::Builder(_) => {
                ErrorCategory::Configuration
            }
        }
    }

    /// Borrow the generation error, if this is one.
    pub fn as_generation(&self) -> Option<&GenerationError> {
        match self.kind() {
            StoryreelErrorKind::Generation(e) => Some(e),
            _ => None,
        }
    }

    /// Borrow the consistency error, if this is one.
    pub fn as_consistency(&self) -> Option<&ConsistencyError> {
        match self.kind() {
            StoryreelErrorKind::Consistency(e) => Some(e),
            _ => None,
        }
    }
}

impl RetryableError for StoryreelError {
    fn is_retryable(&self) -> bool {
        match self.kind() {
            StoryreelErrorKind::Generation(e) => e.is_retryable(),
            // A fresh split may come back with the requested count.
            StoryreelErrorKind::Consistency(e) => {
                matches!(e.kind, ConsistencyErrorKind::SplitCountMismatch { .. })
            }
            _ => false,
        }
    }

    fn min_backoff_ms(&self) -> u64 {
        self.as_generation()
            .map(RetryableError::min_backoff_ms)
            .unwrap_or(0)
    }
}

// Generic From implementation for any type that converts to StoryreelErrorKind
impl<T> From<T> for StoryreelError
where
    T: Into<StoryreelErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for storyreel operations.
pub type StoryreelResult<T> = std::result::Result<T, StoryreelError>;

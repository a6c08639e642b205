//! Composite assembly errors.

/// Failure conditions while planning or rendering a chapter video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum CompositionErrorKind {
    /// A scene's audio has zero length
    #[display("Scene {} has non-positive duration", _0)]
    NonPositiveDuration(u32),
    /// Chapter would exceed the configured maximum length
    #[display("Chapter duration {}ms exceeds maximum {}ms", total_ms, max_ms)]
    ChapterTooLong {
        /// Computed chapter duration
        total_ms: u64,
        /// Configured maximum
        max_ms: u64,
    },
    /// Chapter has not reached the subtitled state
    #[display("Chapter is not ready for composition: {}", _0)]
    NotReady(String),
    /// The muxing primitive failed
    #[display("Media composer failed: {}", _0)]
    Muxer(String),
}

/// Composition error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Composition Error: {} at line {} in {}", kind, line, file)]
pub struct CompositionError {
    /// The kind of error that occurred
    pub kind: CompositionErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl CompositionError {
    /// Create a new composition error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: CompositionErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

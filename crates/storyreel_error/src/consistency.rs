//! Cross-modal consistency errors.
//!
//! These are never retried automatically. They fail the chapter and name the
//! scenes involved.

/// Consistency violations detected between pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ConsistencyErrorKind {
    /// Backend returned a different number of scenes than requested
    #[display("Scene split returned {} scenes, expected {}", actual, expected)]
    SplitCountMismatch {
        /// Requested scene count
        expected: u32,
        /// Scene count the backend produced
        actual: u32,
    },
    /// Artifact counts disagree with the declared scene count
    #[display(
        "Artifact counts disagree with scene count {}: {} images, {} audio, {} subtitles",
        expected,
        images,
        audio,
        subtitles
    )]
    SceneCountMismatch {
        /// Declared scene count
        expected: u32,
        /// Number of image artifacts
        images: u32,
        /// Number of audio artifacts
        audio: u32,
        /// Number of subtitle artifacts
        subtitles: u32,
    },
    /// A required artifact is absent
    #[display("Scene {} is missing its {} artifact", scene, kind)]
    MissingArtifact {
        /// Scene index (1-based)
        scene: u32,
        /// Artifact kind name
        kind: String,
    },
    /// Narration has no content after normalization
    #[display("Narration is empty after normalization")]
    EmptyNarration,
    /// Audio reported a zero length
    #[display("Scene {} has non-positive audio duration", _0)]
    NonPositiveDuration(u32),
    /// Subtitle timing runs past the audio it belongs to
    #[display(
        "Scene {} subtitles end at {}ms but audio is {}ms",
        scene,
        subtitle_ms,
        audio_ms
    )]
    SubtitleOverrun {
        /// Scene index (1-based)
        scene: u32,
        /// End offset of the last caption line
        subtitle_ms: u64,
        /// Audio duration
        audio_ms: u64,
    },
    /// Narration spans do not reconstruct the chapter prose
    #[display("Narration spans do not cover the prose: {}", _0)]
    PartitionMismatch(String),
    /// Chapter state machine rejected a transition
    #[display("Invalid chapter transition from {} to {}", from, to)]
    InvalidTransition {
        /// Current state
        from: String,
        /// Requested state
        to: String,
    },
}

/// Consistency error with location tracking.
///
/// # Examples
///
/// ```
/// use storyreel_error::{ConsistencyError, ConsistencyErrorKind};
///
/// let err = ConsistencyError::new(ConsistencyErrorKind::SplitCountMismatch {
///     expected: 5,
///     actual: 4,
/// });
/// assert!(format!("{}", err).contains("expected 5"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Consistency Error: {} at line {} in {}", kind, line, file)]
pub struct ConsistencyError {
    /// The kind of error that occurred
    pub kind: ConsistencyErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ConsistencyError {
    /// Create a new consistency error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ConsistencyErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

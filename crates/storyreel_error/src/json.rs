//! Errors reading or writing the JSON documents storyreel persists.

/// Which document could not be encoded or decoded.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum JsonErrorKind {
    /// `chNNN_manifest.json`
    #[display("Chapter {} manifest: {}", chapter, reason)]
    Manifest {
        /// Chapter the manifest belongs to
        chapter: u32,
        /// Parser or encoder message
        reason: String,
    },
    /// `chNNN_scenes.json`
    #[display("Chapter {} scene list: {}", chapter, reason)]
    SceneList {
        /// Chapter the scene list belongs to
        chapter: u32,
        /// Parser or encoder message
        reason: String,
    },
    /// Machine-readable status output
    #[display("Status report: {}", _0)]
    StatusReport(String),
}

/// JSON error with source location.
///
/// # Examples
///
/// ```
/// use storyreel_error::{JsonError, JsonErrorKind};
///
/// let err = JsonError::new(JsonErrorKind::Manifest {
///     chapter: 3,
///     reason: "expected `{` at line 1 column 1".to_string(),
/// });
/// assert!(err.to_string().contains("Chapter 3 manifest"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("JSON Error: {} at line {} in {}", kind, line, file)]
pub struct JsonError {
    /// What failed
    pub kind: JsonErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl JsonError {
    /// Create a JSON error at the current location.
    #[track_caller]
    pub fn new(kind: JsonErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// A chapter manifest failed to encode or decode.
    #[track_caller]
    pub fn manifest(chapter: u32, reason: impl ToString) -> Self {
        Self::new(JsonErrorKind::Manifest {
            chapter,
            reason: reason.to_string(),
        })
    }

    /// A chapter scene list failed to encode or decode.
    #[track_caller]
    pub fn scene_list(chapter: u32, reason: impl ToString) -> Self {
        Self::new(JsonErrorKind::SceneList {
            chapter,
            reason: reason.to_string(),
        })
    }
}

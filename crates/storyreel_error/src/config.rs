//! Configuration error types.

/// Why a run could not be configured.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum ConfigErrorKind {
    /// A configuration source could not be read or deserialized
    #[display("Cannot load configuration: {}", _0)]
    Load(String),
    /// A setting is outside its allowed range
    #[display("Invalid setting `{}`: {}", setting, reason)]
    InvalidSetting {
        /// Dotted setting path, such as `pipeline.scene_count`
        setting: String,
        /// What is wrong with the value
        reason: String,
    },
    /// The requested chapter range cannot be run
    #[display("Invalid chapter range: {}", _0)]
    ChapterRange(String),
    /// Neither an outline nor user-written prose is available
    #[display("Outline is empty and no user prose directory is set")]
    NoStorySource,
    /// The log subscriber could not be installed
    #[display("Cannot set up logging: {}", _0)]
    Logging(String),
}

/// Configuration error with source location.
///
/// # Examples
///
/// ```
/// use storyreel_error::{ConfigError, ConfigErrorKind};
///
/// let err = ConfigError::invalid("pipeline.scene_count", "must be between 5 and 50, got 70");
/// assert!(matches!(err.kind, ConfigErrorKind::InvalidSetting { .. }));
/// assert!(err.to_string().contains("pipeline.scene_count"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Configuration Error: {} at line {} in {}", kind, line, file)]
pub struct ConfigError {
    /// What is wrong
    pub kind: ConfigErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl ConfigError {
    /// Create a configuration error at the current location.
    #[track_caller]
    pub fn new(kind: ConfigErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// `setting` holds an unusable value.
    #[track_caller]
    pub fn invalid(setting: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::InvalidSetting {
            setting: setting.into(),
            reason: reason.into(),
        })
    }
}

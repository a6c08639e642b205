//! Validated scene count.

use serde::{Deserialize, Serialize};
use storyreel_error::ConfigError;

/// Smallest number of scenes a chapter may declare.
pub const MIN_SCENES: u32 = 5;
/// Largest number of scenes a chapter may declare.
pub const MAX_SCENES: u32 = 50;

/// Number of scenes per chapter, always within `MIN_SCENES..=MAX_SCENES`.
///
/// # Examples
///
/// ```
/// use storyreel_core::SceneCount;
///
/// assert_eq!(SceneCount::new(12).unwrap().get(), 12);
/// assert!(SceneCount::new(4).is_err());
/// assert_eq!(SceneCount::clamped(80).get(), 50);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[serde(try_from = "u32", into = "u32")]
pub struct SceneCount(u32);

impl SceneCount {
    /// Validate a scene count.
    #[track_caller]
    pub fn new(count: u32) -> Result<Self, ConfigError> {
        if (MIN_SCENES..=MAX_SCENES).contains(&count) {
            Ok(Self(count))
        } else {
            Err(ConfigError::invalid(
                "scene_count",
                format!("must be between {} and {}, got {}", MIN_SCENES, MAX_SCENES, count),
            ))
        }
    }

    /// Clamp an arbitrary value into the allowed range.
    pub fn clamped(count: u32) -> Self {
        Self(count.clamp(MIN_SCENES, MAX_SCENES))
    }

    /// The raw count.
    pub fn get(&self) -> u32 {
        self.0
    }

    /// Scene indices, 1-based.
    pub fn indices(self) -> impl Iterator<Item = u32> {
        1..=self.0
    }
}

impl Default for SceneCount {
    fn default() -> Self {
        Self(MIN_SCENES)
    }
}

impl TryFrom<u32> for SceneCount {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SceneCount> for u32 {
    fn from(value: SceneCount) -> Self {
        value.0
    }
}

//! Pipeline configuration.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use storyreel_core::{SceneCount, StyleTag};
use storyreel_error::ConfigError;
use storyreel_rate_limit::RetryPolicy;

/// Immutable settings for one pipeline, shared by every chapter it runs.
///
/// Deserialized from the `[pipeline]` section of `storyreel.toml`; every field has
/// a default.
///
/// # Examples
///
/// ```
/// use storyreel_pipeline::PipelineConfig;
///
/// let config = PipelineConfig::default();
/// assert_eq!(config.scene_count().get(), 5);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct PipelineConfig {
    /// Scenes per chapter
    scene_count: SceneCount,
    /// Narration voice
    voice: String,
    /// Style used when the splitter does not choose one
    default_style: StyleTag,
    /// Extra requirement appended to prose and image prompts
    requirement: Option<String>,
    /// Per-scene image and audio attempts (K)
    asset_retry: RetryPolicy,
    /// Whole-stage attempts for prose and splitting (M)
    stage_retry: RetryPolicy,
    /// Scenes generating assets at once within a chapter
    scene_concurrency: usize,
    /// Chapters running at once within a batch
    chapter_concurrency: usize,
    /// Allowed caption overrun past the audio end
    subtitle_tolerance_ms: u64,
    /// Hold inserted between consecutive segments
    transition_ms: u64,
    /// Longest chapter video accepted
    max_chapter_ms: u64,
    /// Caption line length before clause splitting kicks in
    max_line_chars: usize,
    /// Silent audio length for scenes without narration
    empty_scene_ms: u64,
    /// Characters of the previous chapter given as context
    previous_context_chars: usize,
    /// Directory with user-written chapters (`chapter_{N}/index.txt`)
    user_prose_dir: Option<PathBuf>,
    /// Regenerate even when valid artifacts exist
    force_regenerate: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scene_count: SceneCount::default(),
            voice: "alloy".to_string(),
            default_style: StyleTag::default(),
            requirement: None,
            asset_retry: RetryPolicy::default(),
            stage_retry: RetryPolicy::default().with_max_attempts(2),
            scene_concurrency: 4,
            chapter_concurrency: 2,
            subtitle_tolerance_ms: 250,
            transition_ms: 0,
            max_chapter_ms: 30 * 60 * 1000,
            max_line_chars: 42,
            empty_scene_ms: 2000,
            previous_context_chars: 1500,
            user_prose_dir: None,
            force_regenerate: false,
        }
    }
}

impl PipelineConfig {
    /// Check limits and retry budgets.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a limit is zero, a retry policy is unusable, or
    /// the stage budget is not smaller than the asset budget.
    #[track_caller]
    pub fn validate(&self) -> Result<(), ConfigError> {
        SceneCount::new(self.scene_count.get())?;
        self.asset_retry.validate()?;
        self.stage_retry.validate()?;
        if self.stage_retry.max_attempts() >= self.asset_retry.max_attempts() {
            return Err(ConfigError::invalid(
                "pipeline.stage_retry.max_attempts",
                format!(
                    "{} must be smaller than asset_retry.max_attempts ({})",
                    self.stage_retry.max_attempts(),
                    self.asset_retry.max_attempts()
                ),
            ));
        }
        if self.scene_concurrency == 0 || self.chapter_concurrency == 0 {
            return Err(ConfigError::invalid(
                "pipeline.scene_concurrency",
                "concurrency limits must be at least 1",
            ));
        }
        if self.max_line_chars == 0 {
            return Err(ConfigError::invalid("pipeline.max_line_chars", "must be positive"));
        }
        if self.empty_scene_ms == 0 || self.max_chapter_ms == 0 {
            return Err(ConfigError::invalid("pipeline", "durations must be positive"));
        }
        if self.voice.trim().is_empty() {
            return Err(ConfigError::invalid("pipeline.voice", "must not be empty"));
        }
        Ok(())
    }

    /// Set the scene count.
    pub fn with_scene_count(mut self, scene_count: SceneCount) -> Self {
        self.scene_count = scene_count;
        self
    }

    /// Set the default style.
    pub fn with_default_style(mut self, style: StyleTag) -> Self {
        self.default_style = style;
        self
    }

    /// Set the requirement; blank clears it.
    pub fn with_requirement(mut self, requirement: Option<String>) -> Self {
        self.requirement = requirement
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        self
    }

    /// Set the per-scene retry policy.
    pub fn with_asset_retry(mut self, policy: RetryPolicy) -> Self {
        self.asset_retry = policy;
        self
    }

    /// Set the whole-stage retry policy.
    pub fn with_stage_retry(mut self, policy: RetryPolicy) -> Self {
        self.stage_retry = policy;
        self
    }

    /// Set the scene fan-out limit.
    pub fn with_scene_concurrency(mut self, limit: usize) -> Self {
        self.scene_concurrency = limit;
        self
    }

    /// Set the chapter concurrency limit.
    pub fn with_chapter_concurrency(mut self, limit: usize) -> Self {
        self.chapter_concurrency = limit;
        self
    }

    /// Set the transition hold.
    pub fn with_transition_ms(mut self, transition_ms: u64) -> Self {
        self.transition_ms = transition_ms;
        self
    }

    /// Set the longest accepted chapter.
    pub fn with_max_chapter_ms(mut self, max_chapter_ms: u64) -> Self {
        self.max_chapter_ms = max_chapter_ms;
        self
    }

    /// Set the user prose directory.
    pub fn with_user_prose_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.user_prose_dir = dir;
        self
    }

    /// Set force-regenerate.
    pub fn with_force_regenerate(mut self, force: bool) -> Self {
        self.force_regenerate = force;
        self
    }
}

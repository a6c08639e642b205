//! Layered configuration for the storyreel binary.
//!
//! Sources, later overriding earlier:
//! 1. Bundled defaults (`storyreel.toml` shipped with this crate)
//! 2. `~/.config/storyreel/storyreel.toml`
//! 3. `./storyreel.toml`, or an explicit file passed with `--config`
//! 4. Environment variables, `STORYREEL__SECTION__KEY`

use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use storyreel_core::{SceneCount, StyleTag};
use storyreel_error::{ConfigError, ConfigErrorKind, StoryreelResult};
use storyreel_media::FfmpegConfig;
use storyreel_models::BackendConfig;
use storyreel_pipeline::PipelineConfig;
use storyreel_rate_limit::LimitConfig;
use tracing::{debug, instrument, warn};

/// Bundled default configuration.
const DEFAULT_CONFIG: &str = include_str!("../storyreel.toml");

/// Rate limits for each backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct BackendLimits {
    /// Prose and scene description calls
    text: LimitConfig,
    /// Image calls
    image: LimitConfig,
    /// Speech calls
    speech: LimitConfig,
}

/// Everything the binary needs to run a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct StoryreelConfig {
    /// Root of the per-chapter artifact directories
    output_dir: PathBuf,
    /// Pipeline settings
    pipeline: PipelineConfig,
    /// Endpoint and models
    backend: BackendConfig,
    /// Per-backend rate limits
    limits: BackendLimits,
    /// Video rendering
    ffmpeg: FfmpegConfig,
}

impl Default for StoryreelConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            pipeline: PipelineConfig::default(),
            backend: BackendConfig::default(),
            limits: BackendLimits::default(),
            ffmpeg: FfmpegConfig::default(),
        }
    }
}

impl StoryreelConfig {
    /// Load configuration from every standard source.
    ///
    /// User files are optional and skipped when absent.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a source cannot be parsed or the merged result
    /// fails validation.
    #[instrument]
    pub fn load() -> StoryreelResult<Self> {
        debug!("Loading configuration: env > ./storyreel.toml > home > bundled defaults");
        let builder = Self::base()
            .add_source(File::with_name("storyreel").required(false))
            .add_source(Self::environment());
        Self::finish(builder)
    }

    /// Load configuration with `path` in place of `./storyreel.toml`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when `path` is missing or invalid, or when the merged
    /// result fails validation.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> StoryreelResult<Self> {
        debug!("Loading configuration from file");
        let builder = Self::base()
            .add_source(File::from(path.as_ref()).required(true))
            .add_source(Self::environment());
        Self::finish(builder)
    }

    /// Parse a TOML document layered over the bundled defaults.
    ///
    /// Environment and user files are not consulted.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the document is invalid.
    pub fn from_toml(document: &str) -> StoryreelResult<Self> {
        let builder = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from_str(document, FileFormat::Toml));
        Self::finish(builder)
    }

    /// Bundled defaults followed by the home directory file.
    fn base() -> ConfigBuilder<DefaultState> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));
        if let Some(config_dir) = dirs::config_dir() {
            let home_config = config_dir.join("storyreel").join("storyreel.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }
        builder
    }

    fn environment() -> Environment {
        Environment::with_prefix("STORYREEL")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> StoryreelResult<Self> {
        let config: Self = builder
            .build()
            .map_err(|e| ConfigError::new(ConfigErrorKind::Load(e.to_string())))?
            .try_deserialize()
            .map_err(|e| ConfigError::new(ConfigErrorKind::Load(e.to_string())))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the pipeline section.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` describing the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid("output_dir", "must not be empty"));
        }
        Ok(())
    }

    /// Replace the output directory.
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Replace the pipeline settings.
    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }
}

/// Command-line values that take precedence over loaded configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOverrides {
    /// Scenes per chapter; clamped into the supported range
    pub scene_count: Option<u32>,
    /// Default scene style
    pub style: Option<StyleTag>,
    /// Output directory
    pub output_dir: Option<PathBuf>,
    /// Directory of user-written chapters
    pub user_prose_dir: Option<PathBuf>,
    /// Regenerate even when valid artifacts exist
    pub force: bool,
}

impl RunOverrides {
    /// Apply these overrides to `config`.
    pub fn apply(&self, config: StoryreelConfig) -> StoryreelConfig {
        let mut pipeline = config.pipeline.clone();
        if let Some(requested) = self.scene_count {
            let count = SceneCount::clamped(requested);
            if count.get() != requested {
                warn!(
                    requested,
                    using = count.get(),
                    "Scene count out of range, clamping"
                );
            }
            pipeline = pipeline.with_scene_count(count);
        }
        if let Some(style) = self.style {
            pipeline = pipeline.with_default_style(style);
        }
        if self.user_prose_dir.is_some() {
            pipeline = pipeline.with_user_prose_dir(self.user_prose_dir.clone());
        }
        if self.force {
            pipeline = pipeline.with_force_regenerate(true);
        }

        let config = config.with_pipeline(pipeline);
        match &self.output_dir {
            Some(dir) => config.with_output_dir(dir.clone()),
            None => config,
        }
    }
}

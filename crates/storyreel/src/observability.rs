//! Logging setup for the storyreel binary.
//!
//! Library crates only emit `tracing` events; this is the one place a subscriber is
//! installed.

use storyreel_error::{ConfigError, ConfigErrorKind, StoryreelResult};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// How log output is filtered and formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset (e.g., "info", "storyreel=debug")
    pub level: String,
    /// Emit one JSON object per event
    pub json: bool,
}

impl LogConfig {
    /// `info`, or `debug` when `verbose`, in human-readable form.
    pub fn new(verbose: bool) -> Self {
        Self {
            level: if verbose { "debug" } else { "info" }.to_string(),
            json: false,
        }
    }

    /// Enable JSON-formatted logs.
    pub fn with_json(mut self, enabled: bool) -> Self {
        self.json = enabled;
        self
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`.
///
/// # Errors
///
/// Returns `ConfigError` when the filter is invalid or a subscriber is already set.
pub fn init_logging(config: &LogConfig) -> StoryreelResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| ConfigError::new(ConfigErrorKind::Logging(format!(
            "invalid filter '{}': {}",
            config.level, e
        ))))?;

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_level(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_level(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| ConfigError::new(ConfigErrorKind::Logging(e.to_string())))?;
    Ok(())
}

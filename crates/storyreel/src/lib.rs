//! storyreel: turn a story outline into narrated, subtitled chapter videos.
//!
//! Each chapter is written as prose, split into scenes, illustrated and narrated
//! scene by scene, captioned against the measured narration, and composed into one
//! video. Progress is persisted after every step so an interrupted or failed batch
//! can be rerun without regenerating what is already valid.
//!
//! # Architecture
//!
//! - `storyreel_error` - Error types and the failure taxonomy
//! - `storyreel_core` - Chapters, scenes, artifacts, subtitle tracks, chapter states
//! - `storyreel_interface` - Backend traits and run reports
//! - `storyreel_rate_limit` - Retry policy and per-backend rate limiting
//! - `storyreel_storage` - Artifact stores and chapter manifests
//! - `storyreel_media` - WAV handling and ffmpeg composition
//! - `storyreel_models` - OpenAI-compatible text, image and speech backends
//! - `storyreel_pipeline` - Splitter, subtitle timer, assembler, orchestrator, batch driver
//!
//! This crate re-exports everything and adds layered configuration, logging setup
//! and the `storyreel` binary.
//!
//! # Example
//!
//! ```no_run
//! use storyreel::{BatchDriver, CancelToken, Outline, StoryreelConfig, build_backends, build_pipeline};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StoryreelConfig::load()?;
//! let pipeline = build_pipeline(&config, build_backends(&config)?)?;
//! let driver = BatchDriver::new(pipeline, Outline::new("A young mage seeks a stolen staff"));
//! let report = driver.run(1..=3, &CancelToken::new()).await?;
//! for chapter in report.chapters() {
//!     println!("{chapter}");
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod app;
mod observability;
mod settings;

pub use app::{build_backends, build_pipeline, load_outline, open_store};
pub use observability::{LogConfig, init_logging};
pub use settings::{BackendLimits, RunOverrides, StoryreelConfig};

pub use storyreel_core::*;
pub use storyreel_error::*;
pub use storyreel_interface::*;
pub use storyreel_media::*;
pub use storyreel_models::*;
pub use storyreel_pipeline::*;
pub use storyreel_rate_limit::*;
pub use storyreel_storage::*;

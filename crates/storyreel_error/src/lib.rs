//! Error types for the storyreel pipeline.
//!
//! This crate provides the foundation error types used throughout the storyreel workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! Every error also maps onto one of four [`ErrorCategory`] values, which is what the
//! orchestrator uses to decide between retrying a call and failing a chapter.
//!
//! # Examples
//!
//! ```
//! use storyreel_error::{ErrorCategory, GenerationError, GenerationErrorKind, RetryableError, StoryreelResult};
//!
//! fn render_scene() -> StoryreelResult<Vec<u8>> {
//!     Err(GenerationError::new(GenerationErrorKind::RateLimited("image backend".into())))?
//! }
//!
//! let err = render_scene().unwrap_err();
//! assert_eq!(err.category(), ErrorCategory::Generation);
//! assert!(err.is_retryable());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod composition;
mod config;
mod consistency;
mod error;
mod generation;
mod json;
mod storage;

pub use builder::BuilderError;
pub use composition::{CompositionError, CompositionErrorKind};
pub use config::{ConfigError, ConfigErrorKind};
pub use consistency::{ConsistencyError, ConsistencyErrorKind};
pub use error::{ErrorCategory, StoryreelError, StoryreelErrorKind, StoryreelResult};
pub use generation::{GenerationError, GenerationErrorKind, RetryableError};
pub use json::{JsonError, JsonErrorKind};
pub use storage::{StorageError, StorageErrorKind};

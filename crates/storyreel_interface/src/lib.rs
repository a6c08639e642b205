//! Capability traits and report types for the storyreel pipeline.
//!
//! Generation backends and the media muxer are external collaborators. The orchestrator
//! only sees them through the traits in this crate, so tests and alternative vendors can
//! be swapped in without touching pipeline code.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod report;
mod traits;

pub use report::{BatchReport, ChapterReport};
pub use traits::{ImageGenerator, MediaComposer, SpeechSynthesizer, TextGenerator};

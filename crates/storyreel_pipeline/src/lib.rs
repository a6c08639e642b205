//! Chapter pipeline orchestration for storyreel.
//!
//! A chapter moves through a fixed sequence of stages:
//!
//! ```text
//! PENDING -> PROSE_READY -> SCENES_SPLIT -> ASSETS_GENERATING
//!         -> ASSETS_COMPLETE -> SUBTITLED -> COMPOSED
//! ```
//!
//! Any non-terminal state may instead end in `FAILED(stage, reason)`. Every transition is
//! persisted to the chapter manifest, and a rerun reuses whatever artifacts the
//! [`ResumePlanner`] finds still valid.
//!
//! # Components
//!
//! - [`SceneSplitter`]: partitions prose into `S` narration spans and asks the text
//!   backend for one visual description per span
//! - [`SubtitleTimer`]: distributes caption lines across measured audio duration
//! - [`CompositeAssembler`]: lays scenes on one timeline and hands it to the composer
//! - [`ChapterPipeline`]: runs one chapter through every stage
//! - [`BatchDriver`]: runs a range of chapters with bounded concurrency
//!
//! # Example
//!
//! ```
//! use storyreel_pipeline::{SubtitleTimer, normalize_narration};
//!
//! let narration = normalize_narration("Mira left at dawn.\n  She did not look back.");
//! let track = SubtitleTimer::new(42).time(1, &narration, 4_000).unwrap();
//! assert_eq!(track.lines().len(), 2);
//! assert_eq!(track.end_ms(), 4_000);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod assembler;
mod batch;
mod cancel;
mod config;
mod extraction;
mod lock;
mod orchestrator;
mod prompts;
mod resume;
mod segment;
mod splitter;
mod subtitle;

pub use assembler::{CompositeAssembler, CompositionPlan};
pub use batch::{BatchDriver, chapter_status};
pub use cancel::CancelToken;
pub use config::PipelineConfig;
pub use extraction::{extract_json, parse_json};
pub use lock::{ChapterGuard, ChapterLocks};
pub use orchestrator::{Backends, ChapterPipeline};
pub use prompts::{prose_request, prose_tail, split_request};
pub use resume::{ResumePlan, ResumePlanner, SceneReuse};
pub use segment::{Granularity, char_len, is_clause_break, is_sentence_end, segment};
pub use splitter::{SceneSplitter, compose_visual_prompt, partition_prose};
pub use subtitle::{SubtitleTimer, normalize_narration, segment_lines};

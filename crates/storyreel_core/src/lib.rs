//! Core data types for the storyreel chapter video pipeline.
//!
//! This crate provides the data model shared by every stage: the outline, chapters and
//! their scenes, artifact identities, subtitle tracks, the chapter state machine, and the
//! typed request/response structs exchanged with generation backends.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod artifact;
mod chapter;
mod outline;
mod request;
mod scene;
mod scene_count;
mod state;
mod style;
mod subtitle;

pub use artifact::{ArtifactKind, ArtifactName, ArtifactRef};
pub use chapter::{Chapter, ChapterVideo, SegmentTiming};
pub use outline::{Outline, OutlineSlice};
pub use request::{
    ComposedVideo, CompositionRequest, CompositionRequestBuilder, CompositionSegment,
    ImageRequest, ImageRequestBuilder, ImageResponse, SpeechRequest, SpeechRequestBuilder,
    SpeechResponse, TextRequest, TextRequestBuilder, TextResponse,
};
pub use scene::{AudioArtifact, NarrationSpan, Scene, SceneDescriptor, SubtitleArtifact};
pub use scene_count::{MAX_SCENES, MIN_SCENES, SceneCount};
pub use state::{ChapterState, FailureReason, PipelineStage};
pub use style::StyleTag;
pub use subtitle::{CaptionLine, SubtitleTrack, format_srt_time, parse_srt_time};

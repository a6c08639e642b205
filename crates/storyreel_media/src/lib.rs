//! Audio probing and chapter composition for storyreel.
//!
//! - [`wav_duration_ms`] measures synthesized narration
//! - [`silent_wav`] produces the audio track for scenes without narration
//! - [`FfmpegComposer`] renders a chapter video from ordered segments

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod ffmpeg;
mod wav;

pub use ffmpeg::{FfmpegComposer, FfmpegConfig};
pub use wav::{DEFAULT_SAMPLE_RATE, silent_wav, wav_duration_ms};

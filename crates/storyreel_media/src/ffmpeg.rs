//! Chapter composition with the ffmpeg command-line tool.

use crate::{DEFAULT_SAMPLE_RATE, silent_wav};
use async_trait::async_trait;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use storyreel_core::{ComposedVideo, CompositionRequest, CompositionSegment, SpeechResponse};
use storyreel_error::{CompositionError, CompositionErrorKind, StoryreelResult};
use storyreel_interface::MediaComposer;
use tokio::process::Command;
use tracing::{debug, info};

/// ffmpeg invocation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct FfmpegConfig {
    /// ffmpeg executable
    binary: String,
    /// Output width in pixels
    width: u32,
    /// Output height in pixels
    height: u32,
    /// Sample rate for generated silence
    sample_rate: u32,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            width: 1280,
            height: 720,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

/// Renders chapter videos by shelling out to ffmpeg.
///
/// Each segment is encoded separately (image looped for the segment span, narration
/// padded with silence to cover any trailing hold), then the segments are joined with
/// the concat demuxer and the chapter captions are muxed as a soft subtitle stream.
#[derive(Debug, Clone, Default)]
pub struct FfmpegComposer {
    config: FfmpegConfig,
}

impl FfmpegComposer {
    /// Create a composer.
    pub fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }

    /// Arguments that encode one segment.
    pub fn segment_args(&self, segment: &CompositionSegment, fps: u32, output: &Path) -> Vec<String> {
        let seconds = format_seconds(segment.span_ms());
        let scale = format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1",
            w = self.config.width,
            h = self.config.height
        );
        vec![
            "-y".into(),
            "-loop".into(),
            "1".into(),
            "-i".into(),
            segment.image_path().display().to_string(),
            "-i".into(),
            segment.audio_path().display().to_string(),
            "-vf".into(),
            scale,
            "-af".into(),
            "apad".into(),
            "-t".into(),
            seconds,
            "-r".into(),
            fps.to_string(),
            "-c:v".into(),
            "libx264".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-c:a".into(),
            "aac".into(),
            "-ar".into(),
            "44100".into(),
            output.display().to_string(),
        ]
    }

    async fn run(&self, args: &[String], step: &str) -> StoryreelResult<()> {
        debug!(step, ?args, "Running ffmpeg");
        let output = Command::new(&self.config.binary)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| muxer_error(format!("Failed to run {}: {}", self.config.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr.lines().rev().take(5).collect::<Vec<_>>().join(" | ");
            return Err(muxer_error(format!("ffmpeg {} failed: {}", step, tail)).into());
        }
        Ok(())
    }
}

#[track_caller]
fn muxer_error(message: String) -> CompositionError {
    CompositionError::new(CompositionErrorKind::Muxer(message))
}

fn format_seconds(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

/// Quote a path for the concat demuxer list.
fn concat_entry(path: &Path) -> String {
    format!("file '{}'\n", path.display().to_string().replace('\'', "'\\''"))
}

#[async_trait]
impl MediaComposer for FfmpegComposer {
    #[tracing::instrument(skip(self, req), fields(chapter = req.chapter(), segments = req.segments().len()))]
    async fn compose(&self, req: &CompositionRequest) -> StoryreelResult<ComposedVideo> {
        req.validate()
            .map_err(|e| muxer_error(format!("invalid composition request: {}", e)))?;

        let workdir = tempfile::tempdir()
            .map_err(|e| muxer_error(format!("Failed to create work directory: {}", e)))?;
        let dir = workdir.path();

        let mut concat_list = String::new();
        for segment in req.segments() {
            let path = dir.join(format!("segment_{:03}.mp4", segment.scene()));
            let args = self.segment_args(segment, *req.fps(), &path);
            self.run(&args, &format!("segment {}", segment.scene())).await?;
            concat_list.push_str(&concat_entry(&path));
        }

        let list_path = dir.join("concat.txt");
        tokio::fs::write(&list_path, concat_list)
            .await
            .map_err(|e| muxer_error(format!("Failed to write concat list: {}", e)))?;

        let merged = dir.join("merged.mp4");
        let concat_args: Vec<String> = vec![
            "-y".into(),
            "-f".into(),
            "concat".into(),
            "-safe".into(),
            "0".into(),
            "-i".into(),
            list_path.display().to_string(),
            "-c".into(),
            "copy".into(),
            merged.display().to_string(),
        ];
        self.run(&concat_args, "concat").await?;

        let subtitles = dir.join("chapter.srt");
        tokio::fs::write(&subtitles, req.subtitles().to_srt())
            .await
            .map_err(|e| muxer_error(format!("Failed to write subtitles: {}", e)))?;

        let output = dir.join("chapter.mp4");
        let mux_args: Vec<String> = vec![
            "-y".into(),
            "-i".into(),
            merged.display().to_string(),
            "-i".into(),
            subtitles.display().to_string(),
            "-map".into(),
            "0".into(),
            "-map".into(),
            "1".into(),
            "-c".into(),
            "copy".into(),
            "-c:s".into(),
            "mov_text".into(),
            output.display().to_string(),
        ];
        self.run(&mux_args, "subtitle mux").await?;

        let bytes = tokio::fs::read(&output)
            .await
            .map_err(|e| muxer_error(format!("Failed to read composed video: {}", e)))?;

        info!(
            chapter = req.chapter(),
            duration_ms = req.total_ms(),
            size = bytes.len(),
            "Composed chapter video"
        );
        Ok(ComposedVideo::new(bytes, req.total_ms()))
    }

    async fn silence(&self, duration_ms: u64) -> StoryreelResult<SpeechResponse> {
        let bytes = silent_wav(duration_ms, self.config.sample_rate)?;
        Ok(SpeechResponse::new(bytes, "audio/wav", duration_ms))
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_segment_covers_duration_and_hold() {
        let composer = FfmpegComposer::default();
        let segment = CompositionSegment::new(
            2,
            PathBuf::from("/out/ch001_sc002_image.png"),
            PathBuf::from("/out/ch001_sc002_audio.wav"),
            3_250,
            500,
        );
        let args = composer.segment_args(&segment, 24, Path::new("/tmp/seg.mp4"));
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "3.750");
        assert!(args.contains(&"apad".to_string()));
        assert_eq!(args.last().unwrap(), "/tmp/seg.mp4");
    }

    #[test]
    fn test_concat_entry_escapes_quotes() {
        assert_eq!(
            concat_entry(Path::new("/tmp/it's.mp4")),
            "file '/tmp/it'\\''s.mp4'\n"
        );
    }

    #[tokio::test]
    async fn test_silence_has_requested_length() {
        let composer = FfmpegComposer::default();
        let audio = composer.silence(1_200).await.unwrap();
        assert_eq!(*audio.duration_ms(), 1_200);
        assert_eq!(crate::wav_duration_ms(audio.bytes()).unwrap(), 1_200);
    }
}

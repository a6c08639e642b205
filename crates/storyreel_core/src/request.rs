//! Typed request and response structs for generation capabilities.
//!
//! Requests are validated at the capability boundary with `validate()`; backends call it
//! before issuing anything over the network.

use crate::{StyleTag, SubtitleTrack};
use derive_builder::Builder;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use storyreel_error::{GenerationError, GenerationErrorKind};

#[track_caller]
fn invalid(message: impl Into<String>) -> GenerationError {
    GenerationError::new(GenerationErrorKind::InvalidInput(message.into()))
}

/// Text generation request.
///
/// # Examples
///
/// ```
/// use storyreel_core::TextRequest;
///
/// let request = TextRequest::builder()
///     .prompt("Write chapter 1.")
///     .system(Some("You are a novelist.".to_string()))
///     .build()
///     .unwrap();
/// assert!(request.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder, Getters)]
#[builder(setter(into))]
pub struct TextRequest {
    /// User prompt
    prompt: String,
    /// System context
    #[builder(default)]
    system: Option<String>,
    /// Maximum tokens to generate
    #[builder(default)]
    max_tokens: Option<u32>,
    /// Sampling temperature
    #[builder(default)]
    temperature: Option<f32>,
}

impl TextRequest {
    /// Creates a new builder for `TextRequest`.
    pub fn builder() -> TextRequestBuilder {
        TextRequestBuilder::default()
    }

    /// Reject empty prompts and out-of-range sampling parameters.
    #[track_caller]
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.prompt.trim().is_empty() {
            return Err(invalid("text prompt is empty"));
        }
        if let Some(t) = self.temperature.filter(|t| !(0.0..=2.0).contains(t)) {
            return Err(invalid(format!("temperature {} outside 0.0..=2.0", t)));
        }
        if self.max_tokens == Some(0) {
            return Err(invalid("max_tokens must be positive"));
        }
        Ok(())
    }
}

/// Text generation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct TextResponse {
    /// Generated text
    text: String,
}

impl TextResponse {
    /// Wrap generated text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Consume the response.
    pub fn into_text(self) -> String {
        self.text
    }
}

/// Image generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder, Getters)]
#[builder(setter(into))]
pub struct ImageRequest {
    /// Visual prompt
    prompt: String,
    /// Style tag
    #[builder(default)]
    style: StyleTag,
}

impl ImageRequest {
    /// Creates a new builder for `ImageRequest`.
    pub fn builder() -> ImageRequestBuilder {
        ImageRequestBuilder::default()
    }

    /// Reject empty prompts.
    #[track_caller]
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.prompt.trim().is_empty() {
            return Err(invalid("image prompt is empty"));
        }
        Ok(())
    }
}

/// Encoded image bytes.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct ImageResponse {
    /// Encoded image
    bytes: Vec<u8>,
    /// MIME type of `bytes`
    mime_type: String,
}

impl ImageResponse {
    /// Wrap image bytes.
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// File extension matching the MIME type.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            _ => "png",
        }
    }

    /// Consume the response.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Speech synthesis request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder, Getters)]
#[builder(setter(into))]
pub struct SpeechRequest {
    /// Text to speak
    text: String,
    /// Voice identifier
    voice: String,
}

impl SpeechRequest {
    /// Creates a new builder for `SpeechRequest`.
    pub fn builder() -> SpeechRequestBuilder {
        SpeechRequestBuilder::default()
    }

    /// Reject empty text or voice.
    #[track_caller]
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.text.trim().is_empty() {
            return Err(invalid("speech text is empty"));
        }
        if self.voice.trim().is_empty() {
            return Err(invalid("voice is empty"));
        }
        Ok(())
    }
}

/// Synthesized audio with its measured duration.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct SpeechResponse {
    /// Encoded audio
    bytes: Vec<u8>,
    /// MIME type of `bytes`
    mime_type: String,
    /// Measured duration
    duration_ms: u64,
}

impl SpeechResponse {
    /// Wrap audio bytes.
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            duration_ms,
        }
    }

    /// File extension matching the MIME type.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "audio/mpeg" | "audio/mp3" => "mp3",
            "audio/ogg" => "ogg",
            _ => "wav",
        }
    }

    /// Consume the response.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// One scene's contribution to the composite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct CompositionSegment {
    /// Scene index (1-based)
    scene: u32,
    /// Image file to hold on screen
    image_path: PathBuf,
    /// Narration audio file
    audio_path: PathBuf,
    /// Audio duration; the image is held this long
    duration_ms: u64,
    /// Silent hold appended after the segment
    hold_ms: u64,
}

impl CompositionSegment {
    /// Create a segment.
    pub fn new(
        scene: u32,
        image_path: PathBuf,
        audio_path: PathBuf,
        duration_ms: u64,
        hold_ms: u64,
    ) -> Self {
        Self {
            scene,
            image_path,
            audio_path,
            duration_ms,
            hold_ms,
        }
    }

    /// Time the segment occupies on the timeline.
    pub fn span_ms(&self) -> u64 {
        self.duration_ms.saturating_add(self.hold_ms)
    }
}

/// Ordered segments plus the chapter caption track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder, Getters)]
#[builder(setter(into))]
pub struct CompositionRequest {
    /// Chapter index
    chapter: u32,
    /// Segments in scene order
    segments: Vec<CompositionSegment>,
    /// Captions on the chapter timeline
    subtitles: SubtitleTrack,
    /// Output frame rate
    #[builder(default = "24")]
    fps: u32,
}

impl CompositionRequest {
    /// Creates a new builder for `CompositionRequest`.
    pub fn builder() -> CompositionRequestBuilder {
        CompositionRequestBuilder::default()
    }

    /// Sum of segment spans.
    pub fn total_ms(&self) -> u64 {
        self.segments.iter().map(CompositionSegment::span_ms).sum()
    }

    /// Reject empty plans and zero-length segments.
    #[track_caller]
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.segments.is_empty() {
            return Err(invalid("composition has no segments"));
        }
        if let Some(segment) = self.segments.iter().find(|s| s.duration_ms == 0) {
            return Err(invalid(format!("scene {} has zero duration", segment.scene)));
        }
        if self.fps == 0 {
            return Err(invalid("fps must be positive"));
        }
        Ok(())
    }
}

/// Container bytes produced by a media composer.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct ComposedVideo {
    /// Encoded container
    bytes: Vec<u8>,
    /// Duration of the container
    duration_ms: u64,
}

impl ComposedVideo {
    /// Wrap composed bytes.
    pub fn new(bytes: Vec<u8>, duration_ms: u64) -> Self {
        Self { bytes, duration_ms }
    }

    /// Consume the video.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

//! Capability traits for generation backends.

use async_trait::async_trait;
use storyreel_core::{
    ComposedVideo, CompositionRequest, ImageRequest, ImageResponse, SpeechRequest,
    SpeechResponse, TextRequest, TextResponse,
};
use storyreel_error::StoryreelResult;

/// Text generation: `(prompt, context) -> text`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for a request.
    async fn generate_text(&self, req: &TextRequest) -> StoryreelResult<TextResponse>;

    /// Provider name (e.g., "openai").
    fn provider_name(&self) -> &'static str;

    /// Model identifier.
    fn model_name(&self) -> &str;
}

/// Image generation: `(prompt, style) -> image bytes`.
///
/// Implementations report `RateLimited`, `BackendUnavailable` or `InvalidPrompt`
/// through `GenerationError`.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate one image.
    async fn generate_image(&self, req: &ImageRequest) -> StoryreelResult<ImageResponse>;

    /// Provider name.
    fn provider_name(&self) -> &'static str;
}

/// Speech synthesis: `(text, voice) -> (audio bytes, duration)`.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize narration. The returned duration is measured from the audio itself.
    async fn synthesize(&self, req: &SpeechRequest) -> StoryreelResult<SpeechResponse>;

    /// Provider name.
    fn provider_name(&self) -> &'static str;
}

/// Media composition: ordered segments -> container.
#[async_trait]
pub trait MediaComposer: Send + Sync {
    /// Render the chapter video.
    async fn compose(&self, req: &CompositionRequest) -> StoryreelResult<ComposedVideo>;

    /// Produce silent audio of the given length, for scenes without narration.
    async fn silence(&self, duration_ms: u64) -> StoryreelResult<SpeechResponse>;

    /// Composer name (e.g., "ffmpeg").
    fn name(&self) -> &'static str;
}

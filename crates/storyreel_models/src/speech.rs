//! Speech synthesis backend.

use crate::{OpenAiClient, SpeechGenerationRequest};
use async_trait::async_trait;
use storyreel_core::{SpeechRequest, SpeechResponse};
use storyreel_error::{BuilderError, GenerationError, GenerationErrorKind, StoryreelResult};
use storyreel_interface::SpeechSynthesizer;
use storyreel_media::wav_duration_ms;
use tracing::{debug, instrument};

/// Speech synthesizer backed by `/audio/speech`, requesting WAV output.
///
/// The duration is measured from the returned audio, never estimated from text.
#[derive(Debug, Clone)]
pub struct OpenAiSpeechSynthesizer {
    client: OpenAiClient,
    model: String,
}

impl OpenAiSpeechSynthesizer {
    /// Creates a new speech synthesizer.
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeechSynthesizer {
    #[instrument(skip(self, req), fields(model = %self.model, voice = %req.voice(), text_len = req.text().len()))]
    async fn synthesize(&self, req: &SpeechRequest) -> StoryreelResult<SpeechResponse> {
        req.validate()?;
        let wire = SpeechGenerationRequest::builder()
            .model(self.model.clone())
            .input(req.text().clone())
            .voice(req.voice().clone())
            .build()
            .map_err(|e| BuilderError::new("speech generation", e))?;

        let (bytes, content_type) = self.client.post_bytes("audio/speech", &wire).await?;
        if bytes.is_empty() {
            return Err(GenerationError::new(GenerationErrorKind::EmptyOutput(
                "speech backend".to_string(),
            ))
            .into());
        }

        let duration_ms = wav_duration_ms(&bytes)?;
        debug!(
            bytes = bytes.len(),
            duration_ms,
            content_type = ?content_type,
            "Received narration"
        );
        Ok(SpeechResponse::new(bytes, "audio/wav", duration_ms))
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

//! Image generation backend.

use crate::{ImageGenerationRequest, ImageGenerationResponse, OpenAiClient};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use storyreel_core::{ImageRequest, ImageResponse};
use storyreel_error::{BuilderError, GenerationError, GenerationErrorKind, StoryreelResult};
use storyreel_interface::ImageGenerator;
use tracing::{debug, error, instrument};

/// Image generator backed by `/images/generations`.
#[derive(Debug, Clone)]
pub struct OpenAiImageGenerator {
    client: OpenAiClient,
    model: String,
    size: String,
}

impl OpenAiImageGenerator {
    /// Creates a new image generator.
    pub fn new(client: OpenAiClient, model: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            size: size.into(),
        }
    }
}

/// Decode the first image of a response.
pub(crate) fn decode_first_image(response: &ImageGenerationResponse) -> StoryreelResult<Vec<u8>> {
    let encoded = response
        .data()
        .first()
        .and_then(|image| image.b64_json().as_deref())
        .filter(|data| !data.is_empty())
        .ok_or_else(|| {
            GenerationError::new(GenerationErrorKind::EmptyOutput("image backend".to_string()))
        })?;

    STANDARD.decode(encoded).map_err(|e| {
        error!(error = ?e, "Image payload is not valid base64");
        GenerationError::new(GenerationErrorKind::MalformedResponse(format!(
            "image payload: {}",
            e
        )))
        .into()
    })
}

#[async_trait]
impl ImageGenerator for OpenAiImageGenerator {
    #[instrument(skip(self, req), fields(model = %self.model, style = %req.style()))]
    async fn generate_image(&self, req: &ImageRequest) -> StoryreelResult<ImageResponse> {
        req.validate()?;
        let wire = ImageGenerationRequest::builder()
            .model(self.model.clone())
            .prompt(req.prompt().clone())
            .size(self.size.clone())
            .build()
            .map_err(|e| BuilderError::new("image generation", e))?;

        let response: ImageGenerationResponse =
            self.client.post_json("images/generations", &wire).await?;
        let bytes = decode_first_image(&response)?;
        debug!(bytes = bytes.len(), "Received image");
        Ok(ImageResponse::new(bytes, "image/png"))
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

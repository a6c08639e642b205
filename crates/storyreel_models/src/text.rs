//! Chat completion text backend.

use crate::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatRole, OpenAiClient,
};
use async_trait::async_trait;
use storyreel_core::{TextRequest, TextResponse};
use storyreel_error::{BuilderError, GenerationError, GenerationErrorKind, StoryreelResult};
use storyreel_interface::TextGenerator;
use tracing::{debug, instrument};

/// Text generator backed by `/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiTextGenerator {
    client: OpenAiClient,
    model: String,
}

impl OpenAiTextGenerator {
    /// Creates a new text generator.
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Build the wire request for a text request.
    pub fn to_wire(&self, req: &TextRequest) -> StoryreelResult<ChatCompletionRequest> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = req.system() {
            messages.push(message(ChatRole::System, system)?);
        }
        messages.push(message(ChatRole::User, req.prompt())?);

        Ok(ChatCompletionRequest::builder()
            .model(self.model.clone())
            .messages(messages)
            .max_tokens(*req.max_tokens())
            .temperature(*req.temperature())
            .build()
            .map_err(|e| BuilderError::new("chat completion", e))?)
    }
}

fn message(role: ChatRole, content: &str) -> StoryreelResult<ChatMessage> {
    Ok(ChatMessage::builder()
        .role(role)
        .content(content)
        .build()
        .map_err(|e| BuilderError::new("chat message", e))?)
}

#[async_trait]
impl TextGenerator for OpenAiTextGenerator {
    #[instrument(skip(self, req), fields(model = %self.model, prompt_len = req.prompt().len()))]
    async fn generate_text(&self, req: &TextRequest) -> StoryreelResult<TextResponse> {
        req.validate()?;
        let wire = self.to_wire(req)?;
        let response: ChatCompletionResponse =
            self.client.post_json("chat/completions", &wire).await?;

        let text = response.first_text().ok_or_else(|| {
            GenerationError::new(GenerationErrorKind::EmptyOutput(format!(
                "text model {}",
                self.model
            )))
        })?;
        debug!(text_len = text.len(), "Received completion");
        Ok(TextResponse::new(text.trim()))
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

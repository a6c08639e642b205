//! OpenAI-compatible backends for storyreel.
//!
//! Any service that speaks the OpenAI REST dialect (`/chat/completions`,
//! `/images/generations`, `/audio/speech`) can serve as the text, image or speech
//! backend. Rate limiting is applied by the caller, around each attempt.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod dto;
mod image;
mod speech;
mod text;

pub use client::OpenAiClient;
pub use config::BackendConfig;
pub use dto::{
    ChatChoice, ChatCompletionRequest, ChatCompletionRequestBuilder, ChatCompletionResponse,
    ChatMessage, ChatMessageBuilder, ChatRole, ImageData, ImageGenerationRequest,
    ImageGenerationRequestBuilder, ImageGenerationResponse, SpeechGenerationRequest,
    SpeechGenerationRequestBuilder,
};
pub use image::OpenAiImageGenerator;
pub use speech::OpenAiSpeechSynthesizer;
pub use text::OpenAiTextGenerator;

//! Wire-format and error-mapping tests for the OpenAI-compatible backends.

use storyreel_core::{SpeechRequest, TextRequest};
use storyreel_error::{ErrorCategory, GenerationErrorKind};
use storyreel_interface::{SpeechSynthesizer, TextGenerator};
use storyreel_models::{
    BackendConfig, ChatCompletionResponse, OpenAiClient, OpenAiSpeechSynthesizer,
    OpenAiTextGenerator, SpeechGenerationRequest,
};

#[test]
fn test_speech_request_asks_for_wav() {
    let wire = SpeechGenerationRequest::builder()
        .model("tts-1")
        .input("Once upon a time.")
        .voice("alloy")
        .build()
        .unwrap();
    let json = serde_json::to_value(&wire).unwrap();
    assert_eq!(json["response_format"], "wav");
    assert_eq!(json["input"], "Once upon a time.");
}

#[test]
fn test_completion_response_parses_first_choice() {
    let response: ChatCompletionResponse = serde_json::from_str(
        r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"The tower fell."},"finish_reason":"stop"}]}"#,
    )
    .unwrap();
    assert_eq!(response.first_text(), Some("The tower fell."));
}

#[tokio::test]
async fn test_empty_prompt_rejected_before_network() {
    let generator = OpenAiTextGenerator::new(
        OpenAiClient::new("http://127.0.0.1:9", "key"),
        "gpt-4o-mini",
    );
    let req = TextRequest::builder().prompt("   ").build().unwrap();
    let err = generator.generate_text(&req).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Generation);
    assert!(matches!(
        err.as_generation().map(|e| &e.kind),
        Some(GenerationErrorKind::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_unreachable_backend_is_retryable() {
    let synthesizer =
        OpenAiSpeechSynthesizer::new(OpenAiClient::new("http://127.0.0.1:9", "key"), "tts-1");
    let req = SpeechRequest::builder()
        .text("Hello.")
        .voice("alloy")
        .build()
        .unwrap();
    let err = synthesizer.synthesize(&req).await.unwrap_err();
    assert!(matches!(
        err.as_generation().map(|e| &e.kind),
        Some(GenerationErrorKind::BackendUnavailable(_))
    ));
    assert_eq!(synthesizer.provider_name(), "openai");
}

#[test]
fn test_default_backend_config() {
    let config = BackendConfig::default().with_base_url("http://localhost:11434/v1");
    assert_eq!(config.base_url(), "http://localhost:11434/v1");
    assert_eq!(config.speech_model(), "tts-1");
}

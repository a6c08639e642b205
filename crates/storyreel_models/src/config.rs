//! Backend endpoint and model configuration.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Endpoint, credentials and model names for the OpenAI-compatible backends.
///
/// Deserialized from the `[backend]` section of `storyreel.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct BackendConfig {
    /// API base URL, without trailing slash
    base_url: String,
    /// Environment variable holding the API key
    api_key_env: String,
    /// Chat model used for prose and scene splitting
    text_model: String,
    /// Image model
    image_model: String,
    /// Requested image size
    image_size: String,
    /// Speech model
    speech_model: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            text_model: "gpt-4o-mini".to_string(),
            image_model: "dall-e-3".to_string(),
            image_size: "1792x1024".to_string(),
            speech_model: "tts-1".to_string(),
        }
    }
}

impl BackendConfig {
    /// Override the base URL (e.g., a local compatible server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

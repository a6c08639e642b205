//! Shared HTTP client for OpenAI-compatible endpoints.

use reqwest::{Client, Response};
use serde::{Serialize, de::DeserializeOwned};
use storyreel_error::{GenerationError, GenerationErrorKind, StoryreelResult};
use tracing::{debug, error, instrument};

/// Authenticated client bound to one base URL.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    /// Creates a new client.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!(base_url = %base_url, "Creating OpenAI-compatible client");
        Self {
            client: Client::new(),
            base_url,
            api_key: api_key.into(),
        }
    }

    /// Creates a client reading the API key from `key_env`.
    ///
    /// # Errors
    ///
    /// Returns `MissingApiKey` if the variable is unset or blank.
    pub fn from_env(base_url: impl Into<String>, key_env: &str) -> StoryreelResult<Self> {
        let api_key = std::env::var(key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                GenerationError::new(GenerationErrorKind::MissingApiKey(key_env.to_string()))
            })?;
        Ok(Self::new(base_url, api_key))
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` to `{base_url}/{path}` and return the successful response.
    #[instrument(skip(self, body), fields(base_url = %self.base_url))]
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> StoryreelResult<Response> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!(url = %url, "Sending request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, url = %url, "Failed to send request");
                GenerationError::new(GenerationErrorKind::BackendUnavailable(format!(
                    "Request to {} failed: {}",
                    url, e
                )))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Backend returned error");
            return Err(GenerationError::from_status(status.as_u16(), body).into());
        }

        Ok(response)
    }

    /// POST and decode a JSON body.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> StoryreelResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.post(path, body).await?;
        response.json::<T>().await.map_err(|e| {
            error!(error = ?e, path, "Failed to parse backend response");
            GenerationError::new(GenerationErrorKind::MalformedResponse(format!(
                "Failed to parse {} response: {}",
                path, e
            )))
            .into()
        })
    }

    /// POST and return the raw body with its content type.
    pub async fn post_bytes<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> StoryreelResult<(Vec<u8>, Option<String>)> {
        let response = self.post(path, body).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_string());
        let bytes = response.bytes().await.map_err(|e| {
            error!(error = ?e, path, "Failed to read backend response body");
            GenerationError::new(GenerationErrorKind::BackendUnavailable(format!(
                "Failed to read {} body: {}",
                path, e
            )))
        })?;
        Ok((bytes.to_vec(), content_type))
    }
}

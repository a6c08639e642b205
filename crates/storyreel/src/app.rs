//! Wiring configuration to concrete backends and storage.

use crate::settings::StoryreelConfig;
use std::path::Path;
use std::sync::Arc;
use storyreel_core::Outline;
use storyreel_error::{StorageError, StorageErrorKind, StoryreelResult};
use storyreel_media::FfmpegComposer;
use storyreel_models::{
    OpenAiClient, OpenAiImageGenerator, OpenAiSpeechSynthesizer, OpenAiTextGenerator,
};
use storyreel_pipeline::{Backends, ChapterPipeline};
use storyreel_rate_limit::RateLimiter;
use storyreel_storage::FileSystemArtifactStore;
use tracing::{info, instrument};

/// OpenAI-compatible backends, each behind its own rate limiter, plus ffmpeg.
///
/// # Errors
///
/// Returns `MissingApiKey` when the configured key variable is unset.
#[instrument(skip(config), fields(base_url = %config.backend().base_url()))]
pub fn build_backends(config: &StoryreelConfig) -> StoryreelResult<Backends> {
    let backend = config.backend();
    let client = OpenAiClient::from_env(backend.base_url(), backend.api_key_env())?;
    let limits = config.limits();

    let text = OpenAiTextGenerator::new(client.clone(), backend.text_model());
    let image =
        OpenAiImageGenerator::new(client.clone(), backend.image_model(), backend.image_size());
    let speech = OpenAiSpeechSynthesizer::new(client, backend.speech_model());
    let composer = FfmpegComposer::new(config.ffmpeg().clone());

    info!(
        text_model = %backend.text_model(),
        image_model = %backend.image_model(),
        speech_model = %backend.speech_model(),
        "Backends configured"
    );
    Ok(Backends::new(
        Arc::new(text),
        Arc::new(image),
        Arc::new(speech),
        Arc::new(composer),
    )
    .with_limiters(
        RateLimiter::new(*limits.text()),
        RateLimiter::new(*limits.image()),
        RateLimiter::new(*limits.speech()),
    ))
}

/// The artifact store rooted at the configured output directory.
///
/// # Errors
///
/// Returns a storage error when the directory cannot be created.
pub fn open_store(config: &StoryreelConfig) -> StoryreelResult<FileSystemArtifactStore> {
    FileSystemArtifactStore::new(config.output_dir())
}

/// A pipeline over `backends` writing to the configured output directory.
///
/// # Errors
///
/// Returns an error when the store cannot be opened or the pipeline settings are
/// invalid.
pub fn build_pipeline(
    config: &StoryreelConfig,
    backends: Backends,
) -> StoryreelResult<ChapterPipeline> {
    let store = Arc::new(open_store(config)?);
    ChapterPipeline::new(config.pipeline().clone(), backends, store.clone(), store)
}

/// Build the outline from a file, inline text, or both (file first).
///
/// Neither source yields an empty outline, which is only usable with user prose.
///
/// # Errors
///
/// Returns `FileRead` when the outline file cannot be read.
pub async fn load_outline(
    file: Option<&Path>,
    text: Option<&str>,
    requirement: Option<&str>,
) -> StoryreelResult<Outline> {
    let mut parts = Vec::new();
    if let Some(path) = file {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileRead(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })?;
        parts.push(content);
    }
    if let Some(text) = text {
        parts.push(text.to_string());
    }

    let outline = Outline::new(parts.join("\n"));
    Ok(match requirement {
        Some(requirement) => outline.with_requirement(requirement),
        None => outline,
    })
}

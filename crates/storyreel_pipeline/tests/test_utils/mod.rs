//! Test utilities for pipeline tests.
//!
//! Mock backends plus a harness wiring them to an in-memory store.

#![allow(dead_code, unused_imports)]

pub mod fixtures;
pub mod mock_backends;

pub use fixtures::{StoredChapter, stored_chapter};
pub use mock_backends::{
    MockComposer, MockImageGenerator, MockSpeechSynthesizer, MockTextGenerator, scene_marker,
};

use std::sync::Arc;
use storyreel_core::Outline;
use storyreel_pipeline::{Backends, ChapterPipeline, PipelineConfig};
use storyreel_rate_limit::{RateLimiter, RetryPolicy};
use storyreel_storage::InMemoryArtifactStore;

/// Seven sentences of chapter prose.
pub const MAGE_PROSE: &str = "Mira had never left the valley before. The staff of her order \
was gone, stolen in the night, and the elders blamed her. She packed bread, a knife, and her \
mother's map. At the ridge she looked back once. Then she walked north toward the ruined \
tower, where the thieves were said to hide. The wind tasted of snow. By dusk she reached the \
old bridge, and a voice called her name from the dark.";

/// The outline the prose above was written from.
pub fn mage_outline() -> Outline {
    Outline::new("A determined young mage vows to retrieve a lost staff")
}

/// Fast, deterministic retry budgets: three asset attempts, two stage attempts.
pub fn test_config() -> PipelineConfig {
    PipelineConfig::default()
        .with_asset_retry(RetryPolicy::new(3, 1, 5, 5_000).without_jitter())
        .with_stage_retry(RetryPolicy::new(2, 1, 5, 5_000).without_jitter())
}

/// Mocks plus a pipeline over a shared in-memory store.
pub struct Harness {
    pub text: Arc<MockTextGenerator>,
    pub image: Arc<MockImageGenerator>,
    pub speech: Arc<MockSpeechSynthesizer>,
    pub composer: Arc<MockComposer>,
    pub store: InMemoryArtifactStore,
    pub pipeline: ChapterPipeline,
}

impl Harness {
    /// Healthy backends over a fresh store.
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_backends(
            config,
            InMemoryArtifactStore::new(),
            MockTextGenerator::new(MAGE_PROSE),
            MockImageGenerator::new(),
            MockSpeechSynthesizer::new(),
        )
    }

    /// Custom backends over `store`; reuse a store to simulate a rerun.
    pub fn with_backends(
        config: PipelineConfig,
        store: InMemoryArtifactStore,
        text: MockTextGenerator,
        image: MockImageGenerator,
        speech: MockSpeechSynthesizer,
    ) -> Self {
        Self::with_image_limiter(config, store, text, image, speech, RateLimiter::unlimited())
    }

    /// Like [`with_backends`](Self::with_backends), with image calls behind `limiter`.
    pub fn with_image_limiter(
        config: PipelineConfig,
        store: InMemoryArtifactStore,
        text: MockTextGenerator,
        image: MockImageGenerator,
        speech: MockSpeechSynthesizer,
        limiter: RateLimiter,
    ) -> Self {
        let text = Arc::new(text);
        let image = Arc::new(image);
        let speech = Arc::new(speech);
        let composer = Arc::new(MockComposer::new());
        let backends = Backends::new(
            text.clone(),
            image.clone(),
            speech.clone(),
            composer.clone(),
        )
        .with_limiters(RateLimiter::unlimited(), limiter, RateLimiter::unlimited());
        let pipeline = ChapterPipeline::new(
            config,
            backends,
            Arc::new(store.clone()),
            Arc::new(store.clone()),
        )
        .expect("valid test config");
        Self {
            text,
            image,
            speech,
            composer,
            store,
            pipeline,
        }
    }

    /// Same store, new healthy backends and `config`.
    pub fn rerun(&self, config: PipelineConfig) -> Self {
        Self::with_backends(
            config,
            self.store.clone(),
            MockTextGenerator::new(MAGE_PROSE),
            MockImageGenerator::new(),
            MockSpeechSynthesizer::new(),
        )
    }
}

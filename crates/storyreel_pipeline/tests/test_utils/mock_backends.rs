//! Mock generation backends for pipeline tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use storyreel_core::{
    ComposedVideo, CompositionRequest, ImageRequest, ImageResponse, SpeechRequest,
    SpeechResponse, TextRequest, TextResponse,
};
use storyreel_error::{GenerationError, GenerationErrorKind, StoryreelResult};
use storyreel_interface::{ImageGenerator, MediaComposer, SpeechSynthesizer, TextGenerator};
use storyreel_pipeline::CancelToken;

/// Prefix of every split request prompt.
const SPLIT_PREFIX: &str = "There are exactly ";

/// Marker the mock text backend puts in every scene description.
pub fn scene_marker(scene: u32) -> String {
    format!("[scene-{:03}]", scene)
}

fn scene_from_prompt(prompt: &str) -> Option<u32> {
    let start = prompt.find("[scene-")? + "[scene-".len();
    prompt.get(start..start + 3)?.parse().ok()
}

/// Text backend that writes fixed prose and describes every passage it is given.
pub struct MockTextGenerator {
    prose: String,
    extra_scenes: usize,
    prose_latency_ms: u64,
    prose_calls: Arc<AtomicUsize>,
    split_calls: Arc<AtomicUsize>,
    prose_prompts: Arc<Mutex<Vec<String>>>,
}

impl MockTextGenerator {
    /// Answer prose requests with `prose`.
    pub fn new(prose: impl Into<String>) -> Self {
        Self {
            prose: prose.into(),
            extra_scenes: 0,
            prose_latency_ms: 1,
            prose_calls: Arc::new(AtomicUsize::new(0)),
            split_calls: Arc::new(AtomicUsize::new(0)),
            prose_prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Describe `extra` more scenes than requested.
    pub fn with_extra_scenes(mut self, extra: usize) -> Self {
        self.extra_scenes = extra;
        self
    }

    /// Take `ms` milliseconds to write prose.
    pub fn with_prose_latency(mut self, ms: u64) -> Self {
        self.prose_latency_ms = ms;
        self
    }

    /// Prose requests received.
    pub fn prose_calls(&self) -> usize {
        self.prose_calls.load(Ordering::SeqCst)
    }

    /// Split requests received.
    pub fn split_calls(&self) -> usize {
        self.split_calls.load(Ordering::SeqCst)
    }

    /// Prompts of every prose request, in arrival order.
    #[allow(dead_code)]
    pub fn prose_prompts(&self) -> Vec<String> {
        self.prose_prompts.lock().unwrap().clone()
    }

    fn describe(&self, prompt: &str) -> String {
        let requested: usize = prompt[SPLIT_PREFIX.len()..]
            .split_whitespace()
            .next()
            .and_then(|n| n.parse().ok())
            .unwrap_or(0);
        let scenes: Vec<String> = (1..=requested + self.extra_scenes)
            .map(|i| {
                format!(
                    r#"{{"scene": {}, "description": "{} a young mage on a windswept road", "style": "anime"}}"#,
                    i,
                    scene_marker(i as u32)
                )
            })
            .collect();
        format!("Here is the storyboard:\n```json\n[{}]\n```", scenes.join(",\n"))
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate_text(&self, req: &TextRequest) -> StoryreelResult<TextResponse> {
        if req.prompt().starts_with(SPLIT_PREFIX) {
            tokio::time::sleep(tokio::time::Duration::from_millis(1)).await;
            self.split_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(TextResponse::new(self.describe(req.prompt())));
        }
        self.prose_calls.fetch_add(1, Ordering::SeqCst);
        self.prose_prompts.lock().unwrap().push(req.prompt().clone());
        tokio::time::sleep(tokio::time::Duration::from_millis(self.prose_latency_ms)).await;
        Ok(TextResponse::new(self.prose.clone()))
    }

    fn provider_name(&self) -> &'static str {
        "mock-text"
    }

    fn model_name(&self) -> &str {
        "mock-text"
    }
}

/// Image backend with scripted failures and latency.
#[derive(Default)]
pub struct MockImageGenerator {
    failing_scenes: Vec<u32>,
    transient_failures: usize,
    cancel_on_call: Option<CancelToken>,
    latency_ms: Vec<u64>,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl MockImageGenerator {
    /// Always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report the backend unavailable for every prompt of these scenes.
    pub fn failing_scenes(mut self, scenes: Vec<u32>) -> Self {
        self.failing_scenes = scenes;
        self
    }

    /// Rate-limit the first `count` calls.
    pub fn with_transient_failures(mut self, count: usize) -> Self {
        self.transient_failures = count;
        self
    }

    /// Cancel `token` as soon as the first call arrives.
    pub fn cancelling(mut self, token: CancelToken) -> Self {
        self.cancel_on_call = Some(token);
        self
    }

    /// Take `latency_ms[n - 1]` milliseconds to answer scene `n`; unlisted scenes take 1ms.
    pub fn with_latency(mut self, latency_ms: Vec<u64>) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most calls ever in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    async fn generate_image(&self, req: &ImageRequest) -> StoryreelResult<ImageResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = &self.cancel_on_call {
            token.cancel();
        }
        let scene = scene_from_prompt(req.prompt());
        let latency = scene
            .and_then(|s| self.latency_ms.get(s as usize - 1).copied())
            .unwrap_or(1);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        tokio::time::sleep(tokio::time::Duration::from_millis(latency)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if call < self.transient_failures {
            return Err(GenerationError::new(GenerationErrorKind::RateLimited(
                "mock image backend".to_string(),
            ))
            .into());
        }
        if scene.is_some_and(|s| self.failing_scenes.contains(&s)) {
            return Err(GenerationError::new(GenerationErrorKind::BackendUnavailable(
                "mock image backend is down".to_string(),
            ))
            .into());
        }
        Ok(ImageResponse::new(
            format!("png:{}", req.prompt()).into_bytes(),
            "image/png",
        ))
    }

    fn provider_name(&self) -> &'static str {
        "mock-image"
    }
}

/// Speech backend whose audio lasts `ms_per_char` per narrated character.
pub struct MockSpeechSynthesizer {
    ms_per_char: u64,
    failing: bool,
    calls: Arc<AtomicUsize>,
}

impl MockSpeechSynthesizer {
    /// 40ms per character.
    pub fn new() -> Self {
        Self {
            ms_per_char: 40,
            failing: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail every call with `BackendUnavailable`.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new()
        }
    }

    /// Calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Duration this backend reports for `text`.
    pub fn duration_for(&self, text: &str) -> u64 {
        text.chars().count() as u64 * self.ms_per_char
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSpeechSynthesizer {
    async fn synthesize(&self, req: &SpeechRequest) -> StoryreelResult<SpeechResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(tokio::time::Duration::from_millis(1)).await;
        if self.failing {
            return Err(GenerationError::new(GenerationErrorKind::BackendUnavailable(
                "mock speech backend is down".to_string(),
            ))
            .into());
        }
        Ok(SpeechResponse::new(
            format!("wav:{}", req.text()).into_bytes(),
            "audio/wav",
            self.duration_for(req.text()),
        ))
    }

    fn provider_name(&self) -> &'static str {
        "mock-speech"
    }
}

/// Composer that records requests and reports the planned duration.
#[derive(Default)]
pub struct MockComposer {
    requests: Arc<Mutex<Vec<CompositionRequest>>>,
}

impl MockComposer {
    /// New composer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests received, in order.
    pub fn requests(&self) -> Vec<CompositionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaComposer for MockComposer {
    async fn compose(&self, req: &CompositionRequest) -> StoryreelResult<ComposedVideo> {
        req.validate()?;
        self.requests.lock().unwrap().push(req.clone());
        Ok(ComposedVideo::new(
            format!("mp4:ch{}", req.chapter()).into_bytes(),
            req.total_ms(),
        ))
    }

    async fn silence(&self, duration_ms: u64) -> StoryreelResult<SpeechResponse> {
        Ok(SpeechResponse::new(vec![0u8; 16], "audio/wav", duration_ms))
    }

    fn name(&self) -> &'static str {
        "mock-composer"
    }
}

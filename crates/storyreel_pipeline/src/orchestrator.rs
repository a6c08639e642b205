//! The chapter pipeline: drives one chapter from outline slice to video.
//!
//! Stages run strictly in order. Each forward transition is validated by
//! [`ChapterState::transition`] and persisted to the chapter manifest before the
//! next stage starts, so a later run can resume from whatever was left behind.
//! Per-scene asset calls fan out concurrently; their failures are collected and
//! reported together rather than aborting sibling scenes.

use crate::assembler::CompositeAssembler;
use crate::cancel::CancelToken;
use crate::config::PipelineConfig;
use crate::lock::ChapterLocks;
use crate::prompts::{prose_request, prose_tail};
use crate::resume::{ResumePlan, ResumePlanner};
use crate::splitter::SceneSplitter;
use crate::subtitle::{SubtitleTimer, normalize_narration};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;
use storyreel_core::{
    ArtifactKind, ArtifactName, ArtifactRef, AudioArtifact, Chapter, ChapterState, ChapterVideo,
    FailureReason, ImageRequest, Outline, PipelineStage, SceneDescriptor, SpeechRequest,
    StyleTag, SubtitleArtifact, SubtitleTrack,
};
use storyreel_error::{
    BuilderError, CompositionErrorKind, ConsistencyErrorKind, ErrorCategory, GenerationError,
    GenerationErrorKind, JsonError, StorageError, StorageErrorKind, StoryreelError,
    StoryreelErrorKind, StoryreelResult,
};
use storyreel_interface::{
    ChapterReport, ImageGenerator, MediaComposer, SpeechSynthesizer, TextGenerator,
};
use storyreel_rate_limit::{RateLimiter, RetryFailure};
use storyreel_storage::{
    ArtifactPresence, ArtifactStore, ChapterManifest, load_manifest, save_manifest,
};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// The four capability backends a pipeline calls, with a rate limiter for each
/// generation backend.
///
/// Limiters default to unlimited. A slot is taken before every attempt and the
/// attempt deadline starts only once it is held.
#[derive(Clone)]
pub struct Backends {
    text: Arc<dyn TextGenerator>,
    image: Arc<dyn ImageGenerator>,
    speech: Arc<dyn SpeechSynthesizer>,
    composer: Arc<dyn MediaComposer>,
    text_limiter: RateLimiter,
    image_limiter: RateLimiter,
    speech_limiter: RateLimiter,
}

impl Backends {
    /// Bundle backends.
    pub fn new(
        text: Arc<dyn TextGenerator>,
        image: Arc<dyn ImageGenerator>,
        speech: Arc<dyn SpeechSynthesizer>,
        composer: Arc<dyn MediaComposer>,
    ) -> Self {
        Self {
            text,
            image,
            speech,
            composer,
            text_limiter: RateLimiter::unlimited(),
            image_limiter: RateLimiter::unlimited(),
            speech_limiter: RateLimiter::unlimited(),
        }
    }

    /// Replace the per-backend rate limiters.
    pub fn with_limiters(
        mut self,
        text: RateLimiter,
        image: RateLimiter,
        speech: RateLimiter,
    ) -> Self {
        self.text_limiter = text;
        self.image_limiter = image;
        self.speech_limiter = speech;
        self
    }

    /// Limiter for text calls.
    pub fn text_limiter(&self) -> &RateLimiter {
        &self.text_limiter
    }

    /// Limiter for image calls.
    pub fn image_limiter(&self) -> &RateLimiter {
        &self.image_limiter
    }

    /// Limiter for speech calls.
    pub fn speech_limiter(&self) -> &RateLimiter {
        &self.speech_limiter
    }

    /// Text backend.
    pub fn text(&self) -> &dyn TextGenerator {
        self.text.as_ref()
    }

    /// Image backend.
    pub fn image(&self) -> &dyn ImageGenerator {
        self.image.as_ref()
    }

    /// Speech backend.
    pub fn speech(&self) -> &dyn SpeechSynthesizer {
        self.speech.as_ref()
    }

    /// Media composer.
    pub fn composer(&self) -> &dyn MediaComposer {
        self.composer.as_ref()
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("text", &self.text.provider_name())
            .field("image", &self.image.provider_name())
            .field("speech", &self.speech.provider_name())
            .field("composer", &self.composer.name())
            .finish()
    }
}

/// Why a stage stopped the chapter.
#[derive(Debug)]
struct StageFailure {
    stage: PipelineStage,
    reason: FailureReason,
}

impl StageFailure {
    fn new(stage: PipelineStage, reason: FailureReason) -> Self {
        Self { stage, reason }
    }

    fn cancelled(stage: PipelineStage) -> Self {
        Self::new(stage, FailureReason::Cancelled)
    }

    fn from_error(stage: PipelineStage, error: &StoryreelError) -> Self {
        let reason = match error.category() {
            ErrorCategory::Resource => FailureReason::Resource {
                message: error.to_string(),
            },
            ErrorCategory::Consistency => FailureReason::Inconsistent {
                scenes: error_scenes(error),
                detail: error.to_string(),
            },
            ErrorCategory::Generation if is_cancellation(error) => FailureReason::Cancelled,
            ErrorCategory::Generation | ErrorCategory::Configuration => FailureReason::Rejected {
                message: error.to_string(),
            },
        };
        Self::new(stage, reason)
    }

    fn from_retry(stage: PipelineStage, failure: &RetryFailure) -> Self {
        if is_cancellation(&failure.error) {
            return Self::cancelled(stage);
        }
        let empty = matches!(
            failure.error.as_generation().map(|e| &e.kind),
            Some(GenerationErrorKind::EmptyOutput(_))
        );
        if empty && stage == PipelineStage::Prose {
            return Self::new(stage, FailureReason::EmptyOutput);
        }
        if failure.exhausted() {
            return Self::new(
                stage,
                FailureReason::RetriesExhausted {
                    attempts: failure.attempts,
                    last_error: failure.error.to_string(),
                },
            );
        }
        Self::from_error(stage, &failure.error)
    }
}

fn is_cancellation(error: &StoryreelError) -> bool {
    matches!(
        error.as_generation().map(|e| &e.kind),
        Some(GenerationErrorKind::Cancelled(_))
    )
}

fn cancelled_error(operation: &str) -> StoryreelError {
    GenerationError::new(GenerationErrorKind::Cancelled(operation.to_string())).into()
}

/// Run one backend call, abandoning it as soon as `cancel` fires.
async fn until_cancelled<T>(
    cancel: &CancelToken,
    operation: &str,
    call: impl Future<Output = StoryreelResult<T>>,
) -> StoryreelResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(cancelled_error(operation)),
        result = call => result,
    }
}

/// Scenes named by an error, if any.
fn error_scenes(error: &StoryreelError) -> Vec<u32> {
    match error.kind() {
        StoryreelErrorKind::Consistency(e) => match &e.kind {
            ConsistencyErrorKind::MissingArtifact { scene, .. }
            | ConsistencyErrorKind::SubtitleOverrun { scene, .. }
            | ConsistencyErrorKind::NonPositiveDuration(scene) => vec![*scene],
            _ => Vec::new(),
        },
        StoryreelErrorKind::Composition(e) => match &e.kind {
            CompositionErrorKind::NonPositiveDuration(scene) => vec![*scene],
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn decode_text(name: &ArtifactName, data: Vec<u8>) -> StoryreelResult<String> {
    String::from_utf8(data).map_err(|e| {
        StorageError::new(StorageErrorKind::FileRead(format!("{}: {}", name, e))).into()
    })
}

/// Orders prose generation inside a batch.
///
/// Chapter N generates its prose only after chapter N-1 has stored its own or
/// stopped, so the previous-chapter context does not depend on scheduling.
#[derive(Debug, Default)]
pub(crate) struct ProseOrder {
    previous: Option<watch::Receiver<bool>>,
    ready: Option<watch::Sender<bool>>,
}

impl ProseOrder {
    /// One entry per chapter of a contiguous range, in chapter order.
    pub(crate) fn chain(len: usize) -> Vec<Self> {
        let mut previous = None;
        (0..len)
            .map(|_| {
                let (ready, receiver) = watch::channel(false);
                let order = Self {
                    previous: previous.take(),
                    ready: Some(ready),
                };
                previous = Some(receiver);
                order
            })
            .collect()
    }

    /// Release the next chapter. Dropping the order releases it too.
    fn release(&mut self) {
        if let Some(ready) = self.ready.take() {
            ready.send_replace(true);
        }
    }
}

/// Mutable state of one chapter run.
struct ChapterRun {
    index: u32,
    state: ChapterState,
    chapter: Option<Chapter>,
    prose_ref: Option<ArtifactRef>,
    scenes_ref: Option<ArtifactRef>,
    video: Option<ChapterVideo>,
    generation_id: Option<Uuid>,
    reused_scenes: Option<u32>,
    calls: Arc<AtomicU32>,
    prose_order: ProseOrder,
}

impl ChapterRun {
    fn new(index: u32, prose_order: ProseOrder) -> Self {
        Self {
            index,
            state: ChapterState::Pending,
            chapter: None,
            prose_ref: None,
            scenes_ref: None,
            video: None,
            generation_id: None,
            reused_scenes: None,
            calls: Arc::new(AtomicU32::new(0)),
            prose_order,
        }
    }

    fn chapter(&self, stage: PipelineStage) -> Result<&Chapter, StageFailure> {
        self.chapter.as_ref().ok_or_else(|| missing_chapter(stage))
    }

    fn chapter_mut(&mut self, stage: PipelineStage) -> Result<&mut Chapter, StageFailure> {
        self.chapter.as_mut().ok_or_else(|| missing_chapter(stage))
    }

    fn report(&self, scene_count: u32, started: Instant) -> ChapterReport {
        let (with_assets, declared) = match &self.chapter {
            Some(chapter) => (
                chapter.scenes().iter().filter(|s| s.has_assets()).count() as u32,
                chapter.scene_count().get(),
            ),
            None => (self.reused_scenes.unwrap_or(0), scene_count),
        };
        ChapterReport::new(
            self.index,
            self.generation_id
                .or_else(|| self.chapter.as_ref().map(|c| *c.generation_id())),
            self.state.clone(),
            with_assets,
            declared,
            self.video.clone(),
            self.calls.load(Ordering::Relaxed),
            started.elapsed().as_millis() as u64,
        )
    }
}

fn missing_chapter(stage: PipelineStage) -> StageFailure {
    StageFailure::new(
        stage,
        FailureReason::Inconsistent {
            scenes: Vec::new(),
            detail: "chapter prose was never established".to_string(),
        },
    )
}

/// Work order for one scene's missing assets.
#[derive(Debug)]
struct SceneJob {
    index: u32,
    prompt: String,
    style: StyleTag,
    narration: String,
    need_image: bool,
    need_audio: bool,
}

/// Result of one scene's fan-out task.
struct SceneOutcome {
    index: u32,
    image: Option<Result<ArtifactRef, RetryFailure>>,
    audio: Option<Result<AudioArtifact, RetryFailure>>,
}

/// Everything a spawned scene task needs, owned.
#[derive(Clone)]
struct SceneWorker {
    chapter: u32,
    backends: Backends,
    store: Arc<dyn ArtifactStore>,
    config: Arc<PipelineConfig>,
    cancel: CancelToken,
    calls: Arc<AtomicU32>,
}

impl SceneWorker {
    #[instrument(skip(self, job), fields(chapter = self.chapter, scene = job.index))]
    async fn run(self, job: SceneJob) -> SceneOutcome {
        let image = async {
            if job.need_image {
                Some(self.image(&job).await)
            } else {
                None
            }
        };
        let audio = async {
            if job.need_audio {
                Some(self.audio(&job).await)
            } else {
                None
            }
        };
        let (image, audio) = tokio::join!(image, audio);
        SceneOutcome {
            index: job.index,
            image,
            audio,
        }
    }

    async fn store(&self, name: &ArtifactName, data: &[u8]) -> Result<ArtifactRef, RetryFailure> {
        self.store
            .put(name, data)
            .await
            .map_err(|error| RetryFailure { attempts: 1, error })
    }

    async fn image(&self, job: &SceneJob) -> Result<ArtifactRef, RetryFailure> {
        let request = ImageRequest::builder()
            .prompt(job.prompt.clone())
            .style(job.style)
            .build()
            .map_err(|e| RetryFailure {
                attempts: 0,
                error: BuilderError::new("image", e).into(),
            })?;

        let label = format!("image ch{:03} sc{:03}", self.chapter, job.index);
        let backend = self.backends.image();
        let calls = self.calls.as_ref();
        let cancel = &self.cancel;
        let request = &request;
        let response = self
            .config
            .asset_retry()
            .run_limited(&label, self.backends.image_limiter(), move || async move {
                if cancel.is_cancelled() {
                    return Err(cancelled_error("image generation"));
                }
                calls.fetch_add(1, Ordering::Relaxed);
                until_cancelled(cancel, "image generation", backend.generate_image(request)).await
            })
            .await?;

        let name = ArtifactName::for_scene(self.chapter, job.index, ArtifactKind::Image)
            .with_extension(response.extension());
        self.store(&name, response.bytes()).await
    }

    async fn audio(&self, job: &SceneJob) -> Result<AudioArtifact, RetryFailure> {
        let label = format!("speech ch{:03} sc{:03}", self.chapter, job.index);
        let response = if job.narration.is_empty() {
            debug!(scene = job.index, "No narration, using silence");
            let composer = self.backends.composer();
            let duration = *self.config.empty_scene_ms();
            self.config
                .asset_retry()
                .run(&label, move || async move { composer.silence(duration).await })
                .await?
        } else {
            let request = SpeechRequest::builder()
                .text(job.narration.clone())
                .voice(self.config.voice().clone())
                .build()
                .map_err(|e| RetryFailure {
                    attempts: 0,
                    error: BuilderError::new("speech", e).into(),
                })?;
            let backend = self.backends.speech();
            let calls = self.calls.as_ref();
            let cancel = &self.cancel;
            let request = &request;
            self.config
                .asset_retry()
                .run_limited(&label, self.backends.speech_limiter(), move || async move {
                    if cancel.is_cancelled() {
                        return Err(cancelled_error("speech synthesis"));
                    }
                    calls.fetch_add(1, Ordering::Relaxed);
                    let response =
                        until_cancelled(cancel, "speech synthesis", backend.synthesize(request))
                            .await?;
                    if *response.duration_ms() == 0 {
                        return Err(GenerationError::new(GenerationErrorKind::EmptyOutput(
                            "speech backend returned zero-length audio".to_string(),
                        ))
                        .into());
                    }
                    Ok(response)
                })
                .await?
        };

        let name = ArtifactName::for_scene(self.chapter, job.index, ArtifactKind::Audio)
            .with_extension(response.extension());
        let reference = self.store(&name, response.bytes()).await?;
        Ok(AudioArtifact::new(reference, *response.duration_ms()))
    }
}

/// Drives chapters through the pipeline.
///
/// Cheap to clone; clones share the artifact store and the per-chapter locks, so
/// two runs of the same chapter never overlap.
///
/// # Examples
///
/// ```rust,ignore
/// use storyreel_pipeline::{Backends, CancelToken, ChapterPipeline, PipelineConfig};
///
/// let pipeline = ChapterPipeline::new(PipelineConfig::default(), backends, store, presence)?;
/// let report = pipeline.run_chapter(&outline, 1, &CancelToken::new()).await;
/// println!("{}", report);
/// ```
#[derive(Clone)]
pub struct ChapterPipeline {
    config: Arc<PipelineConfig>,
    backends: Backends,
    store: Arc<dyn ArtifactStore>,
    presence: Arc<dyn ArtifactPresence>,
    locks: ChapterLocks,
}

impl std::fmt::Debug for ChapterPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChapterPipeline")
            .field("config", &self.config)
            .field("backends", &self.backends)
            .field("store", &self.store.backend_name())
            .finish()
    }
}

impl ChapterPipeline {
    /// Create a pipeline.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `config` fails validation.
    pub fn new(
        config: PipelineConfig,
        backends: Backends,
        store: Arc<dyn ArtifactStore>,
        presence: Arc<dyn ArtifactPresence>,
    ) -> StoryreelResult<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            backends,
            store,
            presence,
            locks: ChapterLocks::new(),
        })
    }

    /// Pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Artifact store.
    pub fn store(&self) -> &dyn ArtifactStore {
        self.store.as_ref()
    }

    /// Run chapter `index` to a terminal state.
    ///
    /// Never returns an error: every failure ends in `FAILED(stage, reason)` in the
    /// report, and artifacts produced before the failure stay in the store.
    pub async fn run_chapter(
        &self,
        outline: &Outline,
        index: u32,
        cancel: &CancelToken,
    ) -> ChapterReport {
        self.run_ordered(outline, index, cancel, ProseOrder::default())
            .await
    }

    /// [`run_chapter`](Self::run_chapter) within a batch, after the previous chapter's prose.
    #[instrument(skip(self, outline, cancel, prose_order), fields(chapter = index))]
    pub(crate) async fn run_ordered(
        &self,
        outline: &Outline,
        index: u32,
        cancel: &CancelToken,
        prose_order: ProseOrder,
    ) -> ChapterReport {
        let started = Instant::now();
        let _guard = match self.locks.try_lock(index).await {
            Some(guard) => guard,
            None => {
                info!("Chapter already running, waiting for it to finish");
                self.locks.lock(index).await
            }
        };
        let mut run = ChapterRun::new(index, prose_order);

        if let Err(failure) = self.drive(&mut run, outline, cancel).await {
            error!(stage = %failure.stage, reason = %failure.reason, "Chapter failed");
            run.state = ChapterState::failed(failure.stage, failure.reason);
            if let Err(e) = self.persist(&run).await {
                error!(error = %e, "Failed to record chapter failure");
            }
        }

        let report = run.report(self.config.scene_count().get(), started);
        info!(
            state = %report.state(),
            calls = report.generation_calls(),
            elapsed_ms = report.elapsed_ms(),
            "Chapter run finished"
        );
        report
    }

    async fn drive(
        &self,
        run: &mut ChapterRun,
        outline: &Outline,
        cancel: &CancelToken,
    ) -> Result<(), StageFailure> {
        let manifest = match load_manifest(self.store.as_ref(), run.index).await {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(error = %e, "Unreadable chapter manifest, starting fresh");
                None
            }
        };
        let plan = ResumePlanner::new(self.presence.as_ref())
            .plan(
                manifest.as_ref(),
                *self.config.scene_count(),
                *self.config.force_regenerate(),
            )
            .await;

        if plan.is_complete() {
            info!("Chapter already composed, reusing artifacts");
            run.state = ChapterState::Composed;
            run.video = plan.video().clone();
            run.generation_id = *plan.generation_id();
            run.reused_scenes = Some(self.config.scene_count().get());
            return Ok(());
        }

        let requirement = outline
            .requirement()
            .clone()
            .or_else(|| self.config.requirement().clone());

        if cancel.is_cancelled() {
            return Err(StageFailure::cancelled(PipelineStage::Prose));
        }
        self.prose_stage(run, outline, &plan, requirement.as_deref(), cancel)
            .await?;
        let scenes_reused = self
            .split_stage(run, &plan, requirement.as_deref(), cancel)
            .await?;
        let reuse = scenes_reused.then_some(&plan);
        self.asset_stage(run, reuse, cancel).await?;
        self.subtitle_stage(run, reuse).await?;
        self.compose_stage(run, cancel).await
    }

    /// Validate, apply and persist a forward transition.
    async fn advance(
        &self,
        run: &mut ChapterRun,
        next: ChapterState,
        stage: PipelineStage,
    ) -> Result<(), StageFailure> {
        let from = run.state.to_string();
        run.state = run
            .state
            .clone()
            .transition(next)
            .map_err(|e| StageFailure::from_error(stage, &e.into()))?;
        info!(from = %from, to = %run.state, "State transition");
        self.persist(run)
            .await
            .map_err(|e| StageFailure::from_error(stage, &e))
    }

    async fn persist(&self, run: &ChapterRun) -> StoryreelResult<()> {
        let manifest = match (&run.chapter, run.generation_id) {
            (Some(chapter), _) => ChapterManifest::snapshot(
                chapter,
                run.state.clone(),
                run.prose_ref.clone(),
                run.scenes_ref.clone(),
                run.video.clone(),
            ),
            // Prose was being produced but never stored.
            (None, Some(generation_id)) => ChapterManifest::without_prose(
                run.index,
                generation_id,
                run.state.clone(),
                self.config.scene_count().get(),
            ),
            // Nothing was attempted, so any earlier manifest stays authoritative.
            (None, None) => return Ok(()),
        };
        save_manifest(self.store.as_ref(), &manifest).await?;
        Ok(())
    }

    // PENDING -> PROSE_READY

    #[instrument(skip_all, fields(chapter = run.index, stage = %PipelineStage::Prose))]
    async fn prose_stage(
        &self,
        run: &mut ChapterRun,
        outline: &Outline,
        plan: &ResumePlan,
        requirement: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<(), StageFailure> {
        let stage = PipelineStage::Prose;
        let index = run.index;

        let mut reused = None;
        if let Some(reference) = plan.prose() {
            match self.read_text(reference).await {
                Ok(text) => reused = Some((text, reference.clone())),
                Err(e) => warn!(error = %e, "Recorded prose unreadable, regenerating"),
            }
        }

        let (prose, prose_ref, generation_id) = match reused {
            Some((text, reference)) => {
                debug!("Reusing prose");
                let generation_id = (*plan.generation_id()).unwrap_or_else(Uuid::new_v4);
                (text, reference, generation_id)
            }
            None => {
                let generation_id = Uuid::new_v4();
                run.generation_id = Some(generation_id);
                let text = match self.user_prose(index).await {
                    Some(text) => {
                        info!("Using user-provided prose");
                        text
                    }
                    None => self.generate_prose(run, outline, requirement, cancel).await?,
                };
                let name = ArtifactName::for_chapter(index, ArtifactKind::Prose);
                let reference = self
                    .store
                    .put(&name, text.as_bytes())
                    .await
                    .map_err(|e| StageFailure::from_error(stage, &e))?;
                (text, reference, generation_id)
            }
        };

        run.chapter = Some(Chapter::restore(
            index,
            generation_id,
            prose,
            *self.config.scene_count(),
        ));
        run.prose_ref = Some(prose_ref);
        run.prose_order.release();
        self.advance(run, ChapterState::ProseReady, stage).await
    }

    async fn read_text(&self, reference: &ArtifactRef) -> StoryreelResult<String> {
        let data = self.store.read_verified(reference).await?;
        decode_text(reference.name(), data)
    }

    async fn user_prose(&self, index: u32) -> Option<String> {
        let path: PathBuf = self
            .config
            .user_prose_dir()
            .as_ref()?
            .join(format!("chapter_{}", index))
            .join("index.txt");
        let text = tokio::fs::read_to_string(&path).await.ok()?;
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    async fn previous_tail(&self, index: u32) -> Option<String> {
        let previous = index.checked_sub(1).filter(|p| *p > 0)?;
        let name = ArtifactName::for_chapter(previous, ArtifactKind::Prose);
        let text = self.store.read_text(&name).await.ok()?;
        Some(prose_tail(&text, *self.config.previous_context_chars()).to_string())
    }

    async fn generate_prose(
        &self,
        run: &ChapterRun,
        outline: &Outline,
        requirement: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<String, StageFailure> {
        let stage = PipelineStage::Prose;
        let slice = outline.slice(run.index);
        if let Some(mut earlier) = run.prose_order.previous.clone() {
            debug!("Waiting for the previous chapter's prose");
            tokio::select! {
                _ = cancel.cancelled() => return Err(StageFailure::cancelled(stage)),
                // An error means the previous chapter stopped without prose.
                _ = async { let _ = earlier.wait_for(|ready| *ready).await; } => {}
            }
        }
        let previous = self.previous_tail(run.index).await;
        let request = prose_request(&slice, previous.as_deref(), requirement)
            .map_err(|e| StageFailure::from_error(stage, &e))?;

        let backend = self.backends.text();
        let calls = run.calls.as_ref();
        let request = &request;
        self.config
            .stage_retry()
            .run_limited("prose", self.backends.text_limiter(), move || async move {
                if cancel.is_cancelled() {
                    return Err(cancelled_error("prose generation"));
                }
                calls.fetch_add(1, Ordering::Relaxed);
                let prose =
                    until_cancelled(cancel, "prose generation", backend.generate_text(request))
                        .await?
                        .into_text();
                let prose = prose.trim();
                if prose.is_empty() {
                    return Err(GenerationError::new(GenerationErrorKind::EmptyOutput(
                        "prose".to_string(),
                    ))
                    .into());
                }
                Ok(prose.to_string())
            })
            .await
            .map_err(|failure| StageFailure::from_retry(stage, &failure))
    }

    // PROSE_READY -> SCENES_SPLIT

    /// Returns whether the recorded scene list was reused.
    #[instrument(skip_all, fields(chapter = run.index, stage = %PipelineStage::Split))]
    async fn split_stage(
        &self,
        run: &mut ChapterRun,
        plan: &ResumePlan,
        requirement: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<bool, StageFailure> {
        let stage = PipelineStage::Split;
        let chapter_index = run.index;

        if let Some(reference) = plan.scenes() {
            match self.load_scenes(reference).await {
                Ok(descriptors) => {
                    let attached = run.chapter_mut(stage)?.attach_scenes(descriptors);
                    match attached {
                        Ok(()) => {
                            debug!("Reusing scene descriptors");
                            run.scenes_ref = Some(reference.clone());
                            self.advance(run, ChapterState::ScenesSplit, stage).await?;
                            return Ok(true);
                        }
                        Err(e) => {
                            warn!(error = %e, "Recorded scenes inconsistent, re-splitting")
                        }
                    }
                }
                Err(e) => warn!(error = %e, "Recorded scenes unreadable, re-splitting"),
            }
        }

        let prose = run.chapter(stage)?.prose().clone();
        let count = *self.config.scene_count();
        let splitter = SceneSplitter::new(
            *self.config.default_style(),
            requirement.map(str::to_string),
        );
        let backend = self.backends.text();
        let calls = run.calls.as_ref();
        let splitter = &splitter;
        let prose = prose.as_str();
        let descriptors = self
            .config
            .stage_retry()
            .run_limited("split", self.backends.text_limiter(), move || async move {
                if cancel.is_cancelled() {
                    return Err(cancelled_error("scene split"));
                }
                calls.fetch_add(1, Ordering::Relaxed);
                until_cancelled(cancel, "scene split", splitter.split(backend, prose, count)).await
            })
            .await
            .map_err(|failure| StageFailure::from_retry(stage, &failure))?;

        let chapter = run.chapter_mut(stage)?;
        chapter
            .attach_scenes(descriptors)
            .map_err(|e| StageFailure::from_error(stage, &e.into()))?;
        let descriptors: Vec<&SceneDescriptor> =
            chapter.scenes().iter().map(|s| s.descriptor()).collect();
        let name = ArtifactName::for_chapter(chapter_index, ArtifactKind::Scenes);
        let data = serde_json::to_vec_pretty(&descriptors).map_err(|e| {
            StageFailure::from_error(stage, &JsonError::scene_list(chapter_index, e).into())
        })?;
        let reference = self
            .store
            .put(&name, &data)
            .await
            .map_err(|e| StageFailure::from_error(stage, &e))?;

        info!(scenes = count.get(), "Prose split into scenes");
        run.scenes_ref = Some(reference);
        self.advance(run, ChapterState::ScenesSplit, stage).await?;
        Ok(false)
    }

    async fn load_scenes(&self, reference: &ArtifactRef) -> StoryreelResult<Vec<SceneDescriptor>> {
        let data = self.store.read_verified(reference).await?;
        serde_json::from_slice(&data)
            .map_err(|e| JsonError::scene_list(*reference.name().chapter(), e).into())
    }

    // SCENES_SPLIT -> ASSETS_GENERATING -> ASSETS_COMPLETE

    #[instrument(skip_all, fields(chapter = run.index, stage = %PipelineStage::Assets))]
    async fn asset_stage(
        &self,
        run: &mut ChapterRun,
        reuse: Option<&ResumePlan>,
        cancel: &CancelToken,
    ) -> Result<(), StageFailure> {
        let stage = PipelineStage::Assets;
        self.advance(run, ChapterState::AssetsGenerating, stage)
            .await?;

        let chapter = run.chapter_mut(stage)?;
        let count = *chapter.scene_count();
        if let Some(plan) = reuse {
            for index in count.indices() {
                let (Some(assets), Some(scene)) = (plan.scene(index), chapter.scene_mut(index))
                else {
                    continue;
                };
                if let Some(image) = assets.image() {
                    scene.set_image(image.clone());
                }
                if let Some(audio) = assets.audio() {
                    scene.set_audio(audio.clone());
                }
            }
        }

        let jobs: Vec<SceneJob> = chapter
            .scenes()
            .iter()
            .filter(|scene| !scene.has_assets())
            .map(|scene| SceneJob {
                index: scene.index(),
                prompt: scene.descriptor().visual_prompt().clone(),
                style: *scene.descriptor().style(),
                narration: normalize_narration(scene.descriptor().narration()),
                need_image: scene.image().is_none(),
                need_audio: scene.audio().is_none(),
            })
            .collect();
        info!(
            pending = jobs.len(),
            reused = chapter.scenes().len() - jobs.len(),
            "Generating scene assets"
        );

        let semaphore = Arc::new(Semaphore::new(*self.config.scene_concurrency()));
        let worker = SceneWorker {
            chapter: run.index,
            backends: self.backends.clone(),
            store: self.store.clone(),
            config: self.config.clone(),
            cancel: cancel.clone(),
            calls: run.calls.clone(),
        };
        let mut tasks = JoinSet::new();
        for job in jobs {
            let worker = worker.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                worker.run(job).await
            });
        }

        let mut resource_failure = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(error = %e, "Scene task did not complete");
                    continue;
                }
            };
            let index = outcome.index;
            let Some(scene) = run
                .chapter
                .as_mut()
                .and_then(|chapter| chapter.scene_mut(index))
            else {
                continue;
            };

            match outcome.image {
                Some(Ok(image)) => scene.set_image(image),
                Some(Err(failure)) => {
                    warn!(scene = index, error = %failure, "Image generation failed");
                    if failure.error.category() == ErrorCategory::Resource {
                        resource_failure = Some(failure.error.to_string());
                    }
                }
                None => {}
            }
            match outcome.audio {
                Some(Ok(audio)) => scene.set_audio(audio),
                Some(Err(failure)) => {
                    warn!(scene = index, error = %failure, "Speech synthesis failed");
                    if failure.error.category() == ErrorCategory::Resource {
                        resource_failure = Some(failure.error.to_string());
                    }
                }
                None => {}
            }

            // Record finished scenes as they land so a crash keeps them.
            self.persist(run)
                .await
                .map_err(|e| StageFailure::from_error(stage, &e))?;
        }

        if cancel.is_cancelled() {
            return Err(StageFailure::cancelled(stage));
        }
        if let Some(message) = resource_failure {
            return Err(StageFailure::new(stage, FailureReason::Resource { message }));
        }
        let missing = run.chapter(stage)?.scenes_missing_assets();
        if !missing.is_empty() {
            return Err(StageFailure::new(
                stage,
                FailureReason::IncompleteScenes { scenes: missing },
            ));
        }

        self.advance(run, ChapterState::AssetsComplete, stage).await
    }

    // ASSETS_COMPLETE -> SUBTITLED

    #[instrument(skip_all, fields(chapter = run.index, stage = %PipelineStage::Subtitles))]
    async fn subtitle_stage(
        &self,
        run: &mut ChapterRun,
        reuse: Option<&ResumePlan>,
    ) -> Result<(), StageFailure> {
        let stage = PipelineStage::Subtitles;
        let timer = SubtitleTimer::new(*self.config.max_line_chars());
        let tolerance = *self.config.subtitle_tolerance_ms();
        let chapter_index = run.index;
        let chapter = run.chapter_mut(stage)?;
        let count = *chapter.scene_count();

        for index in count.indices() {
            let Some(scene) = chapter.scene(index) else {
                continue;
            };
            let narration = scene.descriptor().narration().clone();
            let audio = scene.audio().clone();
            let Some(audio) = audio else {
                return Err(StageFailure::new(
                    stage,
                    FailureReason::Inconsistent {
                        scenes: vec![index],
                        detail: "scene has no audio".to_string(),
                    },
                ));
            };
            let duration = *audio.duration_ms();

            let recorded = reuse
                .and_then(|plan| plan.scene(index))
                .filter(|assets| assets.audio().as_ref() == Some(&audio))
                .and_then(|assets| assets.subtitle().clone());
            if let Some(reference) = recorded {
                match self.load_track(&reference).await {
                    Ok(track) if track.is_well_formed(duration.saturating_add(tolerance)) => {
                        debug!(scene = index, "Reusing subtitles");
                        if let Some(scene) = chapter.scene_mut(index) {
                            scene.set_subtitle(SubtitleArtifact::new(reference, track));
                        }
                        continue;
                    }
                    Ok(_) => warn!(scene = index, "Recorded subtitles do not fit audio, retiming"),
                    Err(e) => warn!(scene = index, error = %e, "Recorded subtitles unreadable"),
                }
            }

            let track = match timer.time(index, &narration, duration) {
                Ok(track) => track,
                Err(e) if e.kind == ConsistencyErrorKind::EmptyNarration => {
                    debug!(scene = index, "Silent scene, empty caption track");
                    SubtitleTrack::empty()
                }
                Err(e) => return Err(StageFailure::from_error(stage, &e.into())),
            };
            let name = ArtifactName::for_scene(chapter_index, index, ArtifactKind::Subtitle);
            let reference = self
                .store
                .put(&name, track.to_srt().as_bytes())
                .await
                .map_err(|e| StageFailure::from_error(stage, &e))?;
            if let Some(scene) = chapter.scene_mut(index) {
                scene.set_subtitle(SubtitleArtifact::new(reference, track));
            }
        }

        let overrun: Vec<u32> = chapter
            .scenes()
            .iter()
            .filter(|scene| !scene.is_complete(tolerance))
            .map(|scene| scene.index())
            .collect();
        if !overrun.is_empty() {
            return Err(StageFailure::new(
                stage,
                FailureReason::Inconsistent {
                    scenes: overrun,
                    detail: "captions do not fit their audio".to_string(),
                },
            ));
        }
        chapter
            .check_artifact_counts()
            .map_err(|e| StageFailure::from_error(stage, &e.into()))?;

        self.advance(run, ChapterState::Subtitled, stage).await
    }

    async fn load_track(&self, reference: &ArtifactRef) -> StoryreelResult<SubtitleTrack> {
        let text = self.read_text(reference).await?;
        Ok(SubtitleTrack::from_srt(&text)?)
    }

    // SUBTITLED -> COMPOSED

    #[instrument(skip_all, fields(chapter = run.index, stage = %PipelineStage::Composition))]
    async fn compose_stage(
        &self,
        run: &mut ChapterRun,
        cancel: &CancelToken,
    ) -> Result<(), StageFailure> {
        let stage = PipelineStage::Composition;
        if cancel.is_cancelled() {
            return Err(StageFailure::cancelled(stage));
        }

        let assembler =
            CompositeAssembler::new(*self.config.transition_ms(), *self.config.max_chapter_ms());
        let video = assembler
            .assemble(
                run.chapter(stage)?,
                self.store.as_ref(),
                self.backends.composer(),
            )
            .await
            .map_err(|e| StageFailure::from_error(stage, &e))?;

        run.video = Some(video);
        self.advance(run, ChapterState::Composed, stage).await
    }
}

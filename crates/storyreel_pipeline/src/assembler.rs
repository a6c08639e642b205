//! Composite assembly: per-scene artifacts to one chapter timeline.

use derive_getters::Getters;
use storyreel_core::{
    ArtifactKind, ArtifactName, Chapter, ChapterVideo, CompositionRequest, CompositionSegment,
    SegmentTiming, SubtitleTrack,
};
use storyreel_error::{BuilderError, CompositionError, CompositionErrorKind, StoryreelResult};
use storyreel_interface::MediaComposer;
use storyreel_storage::ArtifactStore;
use tracing::{debug, info, instrument, warn};

/// The chapter timeline before rendering.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct CompositionPlan {
    /// Renderer input
    request: CompositionRequest,
    /// Where each scene sits on the timeline
    timings: Vec<SegmentTiming>,
    /// Captions shifted onto the chapter timeline
    subtitles: SubtitleTrack,
    /// Timeline length
    total_ms: u64,
}

/// Lays scenes end to end and renders the chapter video.
///
/// Each segment holds the scene's image for exactly its audio duration. A fixed
/// `transition_ms` hold separates consecutive segments, so the chapter lasts
/// `sum(audio) + (S - 1) * transition_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeAssembler {
    transition_ms: u64,
    max_chapter_ms: u64,
}

impl CompositeAssembler {
    /// Create an assembler.
    pub fn new(transition_ms: u64, max_chapter_ms: u64) -> Self {
        Self {
            transition_ms,
            max_chapter_ms,
        }
    }

    /// Lay out `chapter` without rendering.
    ///
    /// # Errors
    ///
    /// `SceneCountMismatch` if artifact counts disagree, `NotReady` if a scene lacks
    /// an artifact, `NonPositiveDuration` for zero-length audio and `ChapterTooLong`
    /// when the timeline exceeds the configured maximum.
    pub fn plan(&self, chapter: &Chapter, store: &dyn ArtifactStore) -> StoryreelResult<CompositionPlan> {
        chapter.check_artifact_counts()?;

        let scene_total = chapter.scenes().len();
        let mut segments = Vec::with_capacity(scene_total);
        let mut timings = Vec::with_capacity(scene_total);
        let mut offsets = Vec::with_capacity(scene_total);
        let mut cursor = 0u64;

        for (position, scene) in chapter.scenes().iter().enumerate() {
            let index = scene.index();
            let (Some(image), Some(audio), Some(subtitle)) =
                (scene.image(), scene.audio(), scene.subtitle())
            else {
                return Err(CompositionError::new(CompositionErrorKind::NotReady(format!(
                    "scene {} is missing artifacts",
                    index
                )))
                .into());
            };
            let duration = *audio.duration_ms();
            if duration == 0 {
                return Err(
                    CompositionError::new(CompositionErrorKind::NonPositiveDuration(index)).into(),
                );
            }
            let hold = if position + 1 < scene_total {
                self.transition_ms
            } else {
                0
            };

            segments.push(CompositionSegment::new(
                index,
                store.local_path(image.name()),
                store.local_path(audio.reference().name()),
                duration,
                hold,
            ));
            timings.push(SegmentTiming::new(index, cursor, duration));
            offsets.push((cursor, subtitle.track()));
            cursor = cursor
                .checked_add(duration)
                .and_then(|end| end.checked_add(hold))
                .ok_or_else(|| {
                    CompositionError::new(CompositionErrorKind::ChapterTooLong {
                        total_ms: u64::MAX,
                        max_ms: self.max_chapter_ms,
                    })
                })?;
        }

        if cursor > self.max_chapter_ms {
            return Err(CompositionError::new(CompositionErrorKind::ChapterTooLong {
                total_ms: cursor,
                max_ms: self.max_chapter_ms,
            })
            .into());
        }

        let subtitles = SubtitleTrack::merge(offsets);
        let request = CompositionRequest::builder()
            .chapter(*chapter.index())
            .segments(segments)
            .subtitles(subtitles.clone())
            .build()
            .map_err(|e| BuilderError::new("composition", e))?;

        Ok(CompositionPlan {
            request,
            timings,
            subtitles,
            total_ms: cursor,
        })
    }

    /// Render `chapter` with `composer` and store the video and chapter captions.
    ///
    /// # Errors
    ///
    /// Anything [`plan`](Self::plan) reports, plus composer and storage failures.
    #[instrument(skip(self, chapter, store, composer), fields(chapter = chapter.index(), composer = composer.name()))]
    pub async fn assemble(
        &self,
        chapter: &Chapter,
        store: &dyn ArtifactStore,
        composer: &dyn MediaComposer,
    ) -> StoryreelResult<ChapterVideo> {
        let plan = self.plan(chapter, store)?;
        debug!(segments = plan.timings.len(), total_ms = plan.total_ms, "Composition planned");

        let video = composer.compose(&plan.request).await.map_err(|e| {
            warn!(error = %e, "Composer failed");
            CompositionError::new(CompositionErrorKind::Muxer(e.to_string()))
        })?;
        if *video.duration_ms() != plan.total_ms {
            debug!(
                planned_ms = plan.total_ms,
                rendered_ms = video.duration_ms(),
                "Rendered duration differs from plan"
            );
        }

        let index = *chapter.index();
        let video_name = ArtifactName::for_chapter(index, ArtifactKind::Video);
        let video_ref = store.put(&video_name, video.bytes()).await?;
        let srt_name = ArtifactName::for_chapter(index, ArtifactKind::Subtitle);
        let srt_ref = store.put(&srt_name, plan.subtitles.to_srt().as_bytes()).await?;

        info!(total_ms = plan.total_ms, video = %video_name, "Chapter composed");
        Ok(ChapterVideo::new(
            index,
            video_ref,
            srt_ref,
            plan.total_ms,
            plan.timings,
        ))
    }
}

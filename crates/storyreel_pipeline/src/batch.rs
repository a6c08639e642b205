//! Batch driver: runs a range of chapters with bounded concurrency.

use crate::cancel::CancelToken;
use crate::orchestrator::{ChapterPipeline, ProseOrder};
use futures::stream::{self, StreamExt};
use std::ops::RangeInclusive;
use storyreel_core::Outline;
use storyreel_error::{ConfigError, ConfigErrorKind, StoryreelResult};
use storyreel_interface::BatchReport;
use storyreel_storage::{ArtifactStore, ChapterManifest, load_manifest};
use tracing::{info, instrument, warn};

/// Runs chapters `[start, end]` of one outline.
///
/// Chapters are independent: each gets its own scenes, artifacts and failure, and a
/// failed chapter never stops its siblings. The one ordering is for prose: a chapter
/// that has to write new prose waits until the previous chapter in the range has
/// stored its own (or stopped), so it can continue from that chapter's ending.
#[derive(Debug, Clone)]
pub struct BatchDriver {
    pipeline: ChapterPipeline,
    outline: Outline,
}

impl BatchDriver {
    /// Create a driver.
    pub fn new(pipeline: ChapterPipeline, outline: Outline) -> Self {
        Self { pipeline, outline }
    }

    /// The pipeline used for each chapter.
    pub fn pipeline(&self) -> &ChapterPipeline {
        &self.pipeline
    }

    /// Run every chapter in `chapters` and collect their reports.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the range is empty or starts at zero, or when the
    /// outline is empty and no user prose directory is configured.
    #[instrument(skip(self, cancel), fields(start = chapters.start(), end = chapters.end()))]
    pub async fn run(
        &self,
        chapters: RangeInclusive<u32>,
        cancel: &CancelToken,
    ) -> StoryreelResult<BatchReport> {
        validate_range(&chapters)?;
        if self.outline.is_empty() && self.pipeline.config().user_prose_dir().is_none() {
            return Err(ConfigError::new(ConfigErrorKind::NoStorySource).into());
        }

        let limit = *self.pipeline.config().chapter_concurrency();
        info!(
            chapters = chapters.clone().count(),
            concurrency = limit,
            "Starting batch"
        );

        let orders = ProseOrder::chain(chapters.clone().count());
        let reports = stream::iter(chapters.zip(orders))
            .map(|(index, order)| {
                self.pipeline
                    .run_ordered(&self.outline, index, cancel, order)
            })
            .buffer_unordered(limit)
            .collect::<Vec<_>>()
            .await;

        let report = BatchReport::new(reports);
        let failed = report.failed().count();
        if failed > 0 {
            warn!(
                composed = report.composed().count(),
                failed,
                "Batch finished with failures"
            );
        } else {
            info!(composed = report.composed().count(), "Batch finished");
        }
        Ok(report)
    }
}

fn validate_range(chapters: &RangeInclusive<u32>) -> Result<(), ConfigError> {
    if *chapters.start() == 0 {
        return Err(ConfigError::new(ConfigErrorKind::ChapterRange(
            "chapters are numbered from 1".to_string(),
        )));
    }
    if chapters.is_empty() {
        return Err(ConfigError::new(ConfigErrorKind::ChapterRange(format!(
            "start chapter {} is after end chapter {}",
            chapters.start(),
            chapters.end()
        ))));
    }
    Ok(())
}

/// Recorded manifests for a range of chapters, `None` where a chapter has never run.
///
/// A manifest that cannot be parsed is reported as missing.
pub async fn chapter_status(
    store: &dyn ArtifactStore,
    chapters: RangeInclusive<u32>,
) -> StoryreelResult<Vec<(u32, Option<ChapterManifest>)>> {
    validate_range(&chapters)?;
    let mut statuses = Vec::new();
    for index in chapters {
        let manifest = match load_manifest(store, index).await {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(chapter = index, error = %e, "Unreadable manifest");
                None
            }
        };
        statuses.push((index, manifest));
    }
    Ok(statuses)
}

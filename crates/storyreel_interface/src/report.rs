//! Run reports.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use storyreel_core::{ChapterState, ChapterVideo};
use uuid::Uuid;

/// Terminal outcome of one chapter run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct ChapterReport {
    /// Chapter index
    chapter: u32,
    /// Generation the run worked on, if prose existed
    generation_id: Option<Uuid>,
    /// Terminal state
    state: ChapterState,
    /// Scenes that ended with image and audio
    scenes_with_assets: u32,
    /// Declared scene count
    scene_count: u32,
    /// Composed video, when the chapter reached `COMPOSED`
    video: Option<ChapterVideo>,
    /// Backend calls issued during this run
    generation_calls: u32,
    /// Wall time of the run
    elapsed_ms: u64,
}

impl ChapterReport {
    /// Create a report.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chapter: u32,
        generation_id: Option<Uuid>,
        state: ChapterState,
        scenes_with_assets: u32,
        scene_count: u32,
        video: Option<ChapterVideo>,
        generation_calls: u32,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            chapter,
            generation_id,
            state,
            scenes_with_assets,
            scene_count,
            video,
            generation_calls,
            elapsed_ms,
        }
    }

    /// Whether the chapter reached `COMPOSED`.
    pub fn is_composed(&self) -> bool {
        self.state.is_composed()
    }
}

impl std::fmt::Display for ChapterReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "chapter {:>3}: {} ({}/{} scenes, {} calls, {}ms)",
            self.chapter,
            self.state,
            self.scenes_with_assets,
            self.scene_count,
            self.generation_calls,
            self.elapsed_ms
        )?;
        if let Some(video) = &self.video {
            write!(f, " -> {} [{}ms]", video.video().name(), video.duration_ms())?;
        }
        Ok(())
    }
}

/// Outcome of a batch of chapters, ordered by chapter index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    chapters: Vec<ChapterReport>,
}

impl BatchReport {
    /// Build a report; chapters are sorted by index.
    pub fn new(mut chapters: Vec<ChapterReport>) -> Self {
        chapters.sort_by_key(|report| report.chapter);
        Self { chapters }
    }

    /// Per-chapter reports.
    pub fn chapters(&self) -> &[ChapterReport] {
        &self.chapters
    }

    /// Report for one chapter.
    pub fn chapter(&self, index: u32) -> Option<&ChapterReport> {
        self.chapters.iter().find(|report| report.chapter == index)
    }

    /// Chapters that reached `COMPOSED`.
    pub fn composed(&self) -> impl Iterator<Item = &ChapterReport> {
        self.chapters.iter().filter(|report| report.is_composed())
    }

    /// Chapters that ended in `FAILED`.
    pub fn failed(&self) -> impl Iterator<Item = &ChapterReport> {
        self.chapters.iter().filter(|report| !report.is_composed())
    }

    /// Whether every chapter composed.
    pub fn all_composed(&self) -> bool {
        self.chapters.iter().all(ChapterReport::is_composed)
    }
}

impl std::fmt::Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for report in &self.chapters {
            writeln!(f, "{}", report)?;
        }
        write!(
            f,
            "{} composed, {} failed",
            self.composed().count(),
            self.failed().count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyreel_core::{FailureReason, PipelineStage};

    fn report(chapter: u32, state: ChapterState) -> ChapterReport {
        ChapterReport::new(chapter, None, state, 0, 5, None, 0, 1)
    }

    #[test]
    fn test_batch_report_orders_and_counts() {
        let batch = BatchReport::new(vec![
            report(2, ChapterState::Composed),
            report(
                1,
                ChapterState::failed(
                    PipelineStage::Assets,
                    FailureReason::IncompleteScenes { scenes: vec![3] },
                ),
            ),
        ]);
        assert_eq!(*batch.chapters()[0].chapter(), 1);
        assert_eq!(batch.composed().count(), 1);
        assert_eq!(batch.failed().count(), 1);
        assert!(!batch.all_composed());
        let text = batch.to_string();
        assert!(text.contains("FAILED(ASSETS, IncompleteScenes [3])"));
        assert!(text.ends_with("1 composed, 1 failed"));
    }

    #[test]
    fn test_report_serializes() {
        let json = serde_json::to_string(&report(4, ChapterState::Composed)).unwrap();
        assert!(json.contains("\"COMPOSED\""));
    }
}

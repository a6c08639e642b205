//! Chapters and their finished videos.

use crate::{ArtifactRef, Scene, SceneCount, SceneDescriptor};
use serde::{Deserialize, Serialize};
use storyreel_error::{ConsistencyError, ConsistencyErrorKind};
use uuid::Uuid;

/// One chapter: prose, declared scene count and its scenes.
///
/// Prose is fixed at construction. Regenerating prose means building a new
/// `Chapter`, which gets a new generation id.
///
/// # Examples
///
/// ```
/// use storyreel_core::{Chapter, SceneCount};
///
/// let chapter = Chapter::new(1, "Mira left at dawn.", SceneCount::new(5).unwrap());
/// assert_eq!(*chapter.index(), 1);
/// assert!(chapter.scenes().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct Chapter {
    index: u32,
    generation_id: Uuid,
    prose: String,
    scene_count: SceneCount,
    scenes: Vec<Scene>,
}

impl Chapter {
    /// Start a fresh generation of chapter `index`.
    pub fn new(index: u32, prose: impl Into<String>, scene_count: SceneCount) -> Self {
        Self::restore(index, Uuid::new_v4(), prose, scene_count)
    }

    /// Rebuild a chapter from persisted state.
    pub fn restore(
        index: u32,
        generation_id: Uuid,
        prose: impl Into<String>,
        scene_count: SceneCount,
    ) -> Self {
        Self {
            index,
            generation_id,
            prose: prose.into(),
            scene_count,
            scenes: Vec::new(),
        }
    }

    /// Install the scene list produced by the splitter.
    ///
    /// # Errors
    ///
    /// `SplitCountMismatch` if the count differs from the declared scene count,
    /// `PartitionMismatch` if indices are not `1..=S` in order.
    #[track_caller]
    pub fn attach_scenes(&mut self, descriptors: Vec<SceneDescriptor>) -> Result<(), ConsistencyError> {
        let expected = self.scene_count.get();
        let actual = u32::try_from(descriptors.len()).unwrap_or(u32::MAX);
        if actual != expected {
            return Err(ConsistencyError::new(
                ConsistencyErrorKind::SplitCountMismatch { expected, actual },
            ));
        }
        if let Some((position, descriptor)) = descriptors
            .iter()
            .enumerate()
            .find(|(i, d)| *d.index() as usize != i + 1)
        {
            return Err(ConsistencyError::new(
                ConsistencyErrorKind::PartitionMismatch(format!(
                    "scene at position {} has index {}",
                    position + 1,
                    descriptor.index()
                )),
            ));
        }
        self.scenes = descriptors.into_iter().map(Scene::new).collect();
        Ok(())
    }

    /// Scene by 1-based index.
    pub fn scene(&self, index: u32) -> Option<&Scene> {
        self.scenes.get(index.checked_sub(1)? as usize)
    }

    /// Mutable scene by 1-based index.
    pub fn scene_mut(&mut self, index: u32) -> Option<&mut Scene> {
        self.scenes.get_mut(index.checked_sub(1)? as usize)
    }

    /// Scenes lacking an image or audio, ascending.
    pub fn scenes_missing_assets(&self) -> Vec<u32> {
        self.scenes
            .iter()
            .filter(|scene| !scene.has_assets())
            .map(Scene::index)
            .collect()
    }

    /// Verify that images, audio and subtitles all match the declared scene count.
    ///
    /// # Errors
    ///
    /// `SceneCountMismatch` when any count differs.
    #[track_caller]
    pub fn check_artifact_counts(&self) -> Result<(), ConsistencyError> {
        let count = |f: fn(&Scene) -> bool| self.scenes.iter().filter(|s| f(s)).count() as u32;
        let images = count(|s| s.image().is_some());
        let audio = count(|s| s.audio().is_some());
        let subtitles = count(|s| s.subtitle().is_some());
        let expected = self.scene_count.get();

        if images == expected && audio == expected && subtitles == expected {
            Ok(())
        } else {
            Err(ConsistencyError::new(
                ConsistencyErrorKind::SceneCountMismatch {
                    expected,
                    images,
                    audio,
                    subtitles,
                },
            ))
        }
    }
}

/// Placement of one scene on the chapter timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct SegmentTiming {
    scene: u32,
    start_ms: u64,
    duration_ms: u64,
}

impl SegmentTiming {
    /// Create a segment timing.
    pub fn new(scene: u32, start_ms: u64, duration_ms: u64) -> Self {
        Self {
            scene,
            start_ms,
            duration_ms,
        }
    }

    /// End of the segment on the chapter timeline.
    pub fn end_ms(&self) -> u64 {
        self.start_ms.saturating_add(self.duration_ms)
    }
}

/// The composed chapter video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters)]
pub struct ChapterVideo {
    chapter: u32,
    video: ArtifactRef,
    subtitles: ArtifactRef,
    duration_ms: u64,
    segments: Vec<SegmentTiming>,
}

impl ChapterVideo {
    /// Record a composed video.
    pub fn new(
        chapter: u32,
        video: ArtifactRef,
        subtitles: ArtifactRef,
        duration_ms: u64,
        segments: Vec<SegmentTiming>,
    ) -> Self {
        Self {
            chapter,
            video,
            subtitles,
            duration_ms,
            segments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NarrationSpan, StyleTag};

    fn descriptors(n: u32) -> Vec<SceneDescriptor> {
        (1..=n)
            .map(|i| {
                SceneDescriptor::new(i, "x", NarrationSpan::new(0, 1), "p", StyleTag::Anime)
            })
            .collect()
    }

    #[test]
    fn test_attach_rejects_wrong_count() {
        let mut chapter = Chapter::new(1, "x", SceneCount::new(5).unwrap());
        let err = chapter.attach_scenes(descriptors(4)).unwrap_err();
        assert_eq!(
            err.kind,
            ConsistencyErrorKind::SplitCountMismatch {
                expected: 5,
                actual: 4
            }
        );
        chapter.attach_scenes(descriptors(5)).unwrap();
        assert_eq!(chapter.scenes().len(), 5);
        assert_eq!(chapter.scenes_missing_assets(), vec![1, 2, 3, 4, 5]);
        assert!(chapter.scene(0).is_none());
        assert_eq!(chapter.scene(5).map(Scene::index), Some(5));
    }

    #[test]
    fn test_counts_block_when_artifacts_missing() {
        let mut chapter = Chapter::new(1, "x", SceneCount::new(5).unwrap());
        chapter.attach_scenes(descriptors(5)).unwrap();
        let err = chapter.check_artifact_counts().unwrap_err();
        assert!(matches!(
            err.kind,
            ConsistencyErrorKind::SceneCountMismatch { images: 0, .. }
        ));
    }

    #[test]
    fn test_new_chapters_get_distinct_generations() {
        let count = SceneCount::default();
        assert_ne!(
            Chapter::new(1, "a", count).generation_id(),
            Chapter::new(1, "a", count).generation_id()
        );
    }

    #[test]
    fn test_segment_end_saturates() {
        assert_eq!(SegmentTiming::new(1, 2_000, 500).end_ms(), 2_500);
        assert_eq!(SegmentTiming::new(1, u64::MAX - 1, 500).end_ms(), u64::MAX);
    }
}

//! Chapter manifest: the persisted record of a chapter's state and artifacts.

use crate::ArtifactStore;
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use storyreel_core::{
    ArtifactKind, ArtifactName, ArtifactRef, AudioArtifact, Chapter, ChapterState, ChapterVideo,
};
use storyreel_error::{JsonError, StoryreelResult};
use uuid::Uuid;

/// Recorded artifacts of one scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct SceneRecord {
    scene: u32,
    image: Option<ArtifactRef>,
    audio: Option<AudioArtifact>,
    subtitle: Option<ArtifactRef>,
}

impl SceneRecord {
    /// Create a scene record.
    pub fn new(
        scene: u32,
        image: Option<ArtifactRef>,
        audio: Option<AudioArtifact>,
        subtitle: Option<ArtifactRef>,
    ) -> Self {
        Self {
            scene,
            image,
            audio,
            subtitle,
        }
    }
}

/// Everything needed to decide what a rerun may reuse.
///
/// Saved as `chNNN_manifest.json` after every state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct ChapterManifest {
    chapter: u32,
    generation_id: Uuid,
    state: ChapterState,
    scene_count: u32,
    prose: Option<ArtifactRef>,
    scenes: Option<ArtifactRef>,
    scene_records: Vec<SceneRecord>,
    video: Option<ChapterVideo>,
    updated_at: DateTime<Utc>,
}

impl ChapterManifest {
    /// Snapshot a chapter in `state`.
    pub fn snapshot(
        chapter: &Chapter,
        state: ChapterState,
        prose: Option<ArtifactRef>,
        scenes: Option<ArtifactRef>,
        video: Option<ChapterVideo>,
    ) -> Self {
        let scene_records = chapter
            .scenes()
            .iter()
            .map(|scene| {
                SceneRecord::new(
                    scene.index(),
                    scene.image().clone(),
                    scene.audio().clone(),
                    scene.subtitle().as_ref().map(|s| s.reference().clone()),
                )
            })
            .collect();

        Self {
            chapter: *chapter.index(),
            generation_id: *chapter.generation_id(),
            state,
            scene_count: chapter.scene_count().get(),
            prose,
            scenes,
            scene_records,
            video,
            updated_at: Utc::now(),
        }
    }

    /// A chapter that stopped before its prose was stored.
    ///
    /// Only the state is worth keeping; a rerun starts from scratch.
    pub fn without_prose(
        chapter: u32,
        generation_id: Uuid,
        state: ChapterState,
        scene_count: u32,
    ) -> Self {
        Self {
            chapter,
            generation_id,
            state,
            scene_count,
            prose: None,
            scenes: None,
            scene_records: Vec::new(),
            video: None,
            updated_at: Utc::now(),
        }
    }

    /// Record for one scene.
    pub fn scene(&self, index: u32) -> Option<&SceneRecord> {
        self.scene_records.iter().find(|record| record.scene == index)
    }

    /// Every artifact reference in the manifest.
    pub fn artifact_refs(&self) -> Vec<&ArtifactRef> {
        let mut refs: Vec<&ArtifactRef> = self.prose.iter().chain(self.scenes.iter()).collect();
        for record in &self.scene_records {
            refs.extend(record.image.iter());
            refs.extend(record.audio.iter().map(AudioArtifact::reference));
            refs.extend(record.subtitle.iter());
        }
        if let Some(video) = &self.video {
            refs.push(video.video());
            refs.push(video.subtitles());
        }
        refs
    }
}

/// Load a chapter's manifest, or `None` if it has never been saved.
///
/// # Errors
///
/// Storage failures other than absence, or a manifest that is not valid JSON.
#[tracing::instrument(skip(store))]
pub async fn load_manifest(
    store: &dyn ArtifactStore,
    chapter: u32,
) -> StoryreelResult<Option<ChapterManifest>> {
    let name = ArtifactName::for_chapter(chapter, ArtifactKind::Manifest);
    if !store.exists(&name).await? {
        return Ok(None);
    }
    let data = store.read(&name).await?;
    let manifest =
        serde_json::from_slice(&data).map_err(|e| JsonError::manifest(chapter, e))?;
    Ok(Some(manifest))
}

/// Persist a chapter's manifest atomically.
#[tracing::instrument(skip(store, manifest), fields(chapter = manifest.chapter, state = %manifest.state))]
pub async fn save_manifest(
    store: &dyn ArtifactStore,
    manifest: &ChapterManifest,
) -> StoryreelResult<ArtifactRef> {
    let name = ArtifactName::for_chapter(manifest.chapter, ArtifactKind::Manifest);
    let data = serde_json::to_vec_pretty(manifest)
        .map_err(|e| JsonError::manifest(manifest.chapter, e))?;
    store.put(&name, &data).await
}

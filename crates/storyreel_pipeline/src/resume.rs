//! Resumption: decide which persisted artifacts a rerun may reuse.

use derive_getters::Getters;
use std::collections::BTreeMap;
use storyreel_core::{ArtifactName, ArtifactRef, AudioArtifact, ChapterVideo, SceneCount};
use storyreel_storage::{ArtifactPresence, ChapterManifest, Presence};
use tracing::{debug, info};
use uuid::Uuid;

/// Reusable artifacts of one scene.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters)]
pub struct SceneReuse {
    image: Option<ArtifactRef>,
    audio: Option<AudioArtifact>,
    subtitle: Option<ArtifactRef>,
}

impl SceneReuse {
    /// Whether all three artifacts can be reused.
    pub fn is_complete(&self) -> bool {
        self.image.is_some() && self.audio.is_some() && self.subtitle.is_some()
    }
}

/// What a chapter run can skip.
///
/// Validity cascades forward: without prose nothing is reused, without scene
/// descriptors no scene asset is reused, and a subtitle is only reused together
/// with the audio it was timed against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters)]
pub struct ResumePlan {
    /// Generation the reused prose belongs to
    generation_id: Option<Uuid>,
    /// Reusable prose
    prose: Option<ArtifactRef>,
    /// Reusable scene descriptor file
    scenes: Option<ArtifactRef>,
    /// Reusable per-scene artifacts, by scene index
    scene_assets: BTreeMap<u32, SceneReuse>,
    /// Composed video, when the whole chapter is still valid
    video: Option<ChapterVideo>,
    /// Recorded artifacts found missing or corrupt
    discarded: Vec<ArtifactName>,
}

impl ResumePlan {
    /// Plan for a run that reuses nothing.
    pub fn fresh() -> Self {
        Self::default()
    }

    /// Whether the chapter is already composed and intact.
    pub fn is_complete(&self) -> bool {
        self.video.is_some()
    }

    /// Reusable artifacts for one scene.
    pub fn scene(&self, index: u32) -> Option<&SceneReuse> {
        self.scene_assets.get(&index)
    }
}

/// Produces [`ResumePlan`]s by checking a manifest against an artifact presence oracle.
pub struct ResumePlanner<'a> {
    presence: &'a dyn ArtifactPresence,
}

impl<'a> ResumePlanner<'a> {
    /// Create a planner backed by `presence`.
    pub fn new(presence: &'a dyn ArtifactPresence) -> Self {
        Self { presence }
    }

    async fn keep(&self, reference: &ArtifactRef, discarded: &mut Vec<ArtifactName>) -> bool {
        match self.presence.check(reference).await {
            Presence::Valid => true,
            other => {
                debug!(artifact = %reference.name(), presence = ?other, "Artifact not reusable");
                discarded.push(reference.name().clone());
                false
            }
        }
    }

    /// Decide what can be reused from `manifest`.
    ///
    /// `force` or a missing manifest yields [`ResumePlan::fresh`]. A manifest
    /// recorded with a different scene count keeps only the prose.
    #[tracing::instrument(skip(self, manifest), fields(chapter = manifest.map(|m| *m.chapter())))]
    pub async fn plan(
        &self,
        manifest: Option<&ChapterManifest>,
        scene_count: SceneCount,
        force: bool,
    ) -> ResumePlan {
        let Some(manifest) = manifest.filter(|_| !force) else {
            return ResumePlan::fresh();
        };
        let mut plan = ResumePlan::fresh();

        let Some(prose) = manifest.prose() else {
            return plan;
        };
        if !self.keep(prose, &mut plan.discarded).await {
            info!("Prose invalid, regenerating chapter");
            return plan;
        }
        plan.prose = Some(prose.clone());
        plan.generation_id = Some(*manifest.generation_id());

        if *manifest.scene_count() != scene_count.get() {
            info!(
                recorded = manifest.scene_count(),
                requested = scene_count.get(),
                "Scene count changed, re-splitting"
            );
            return plan;
        }
        let Some(scenes) = manifest.scenes() else {
            return plan;
        };
        if !self.keep(scenes, &mut plan.discarded).await {
            return plan;
        }
        plan.scenes = Some(scenes.clone());

        for index in scene_count.indices() {
            let Some(record) = manifest.scene(index) else {
                continue;
            };
            let mut reuse = SceneReuse::default();
            if let Some(image) = record.image() {
                if self.keep(image, &mut plan.discarded).await {
                    reuse.image = Some(image.clone());
                }
            }
            if let Some(audio) = record.audio().as_ref().filter(|a| *a.duration_ms() > 0) {
                if self.keep(audio.reference(), &mut plan.discarded).await {
                    reuse.audio = Some(audio.clone());
                }
            }
            if let Some(subtitle) = record.subtitle().as_ref().filter(|_| reuse.audio.is_some()) {
                if self.keep(subtitle, &mut plan.discarded).await {
                    reuse.subtitle = Some(subtitle.clone());
                }
            }
            plan.scene_assets.insert(index, reuse);
        }

        let all_scenes_intact = scene_count
            .indices()
            .all(|i| plan.scene(i).is_some_and(SceneReuse::is_complete));
        if let Some(video) = manifest.video().as_ref().filter(|_| {
            manifest.state().is_composed() && all_scenes_intact
        }) {
            let video_ok = self.keep(video.video(), &mut plan.discarded).await;
            let subtitles_ok = self.keep(video.subtitles(), &mut plan.discarded).await;
            if video_ok && subtitles_ok {
                plan.video = Some(video.clone());
            }
        }

        debug!(
            reusable_scenes = plan.scene_assets.values().filter(|s| s.is_complete()).count(),
            discarded = plan.discarded.len(),
            complete = plan.is_complete(),
            "Resume plan ready"
        );
        plan
    }
}

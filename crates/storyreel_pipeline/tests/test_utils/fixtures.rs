//! Chapters with stored artifacts, built without running the pipeline.

use storyreel_core::{
    ArtifactKind, ArtifactName, ArtifactRef, AudioArtifact, Chapter, SceneCount,
    SceneDescriptor, StyleTag, SubtitleArtifact,
};
use storyreel_pipeline::{SubtitleTimer, partition_prose};
use storyreel_storage::ArtifactStore;

/// A stored chapter plus the references a manifest would carry.
pub struct StoredChapter {
    pub chapter: Chapter,
    pub prose: ArtifactRef,
    pub scenes: ArtifactRef,
}

/// Store prose, scene list and every scene asset for `chapter_index`.
///
/// Scene `i` gets audio lasting `durations[i - 1]` milliseconds.
pub async fn stored_chapter(
    store: &dyn ArtifactStore,
    chapter_index: u32,
    prose: &str,
    durations: &[u64],
) -> StoredChapter {
    let count = SceneCount::new(durations.len() as u32).unwrap();
    let mut chapter = Chapter::new(chapter_index, prose, count);
    let descriptors: Vec<SceneDescriptor> = partition_prose(prose, count.get())
        .into_iter()
        .enumerate()
        .map(|(i, span)| {
            let narration = &prose[*span.start()..*span.end()];
            SceneDescriptor::new(i as u32 + 1, narration, span, "a mage", StyleTag::Anime)
        })
        .collect();

    let prose_ref = store
        .put(&ArtifactName::for_chapter(chapter_index, ArtifactKind::Prose), prose.as_bytes())
        .await
        .unwrap();
    let scenes_ref = store
        .put(
            &ArtifactName::for_chapter(chapter_index, ArtifactKind::Scenes),
            &serde_json::to_vec(&descriptors).unwrap(),
        )
        .await
        .unwrap();
    chapter.attach_scenes(descriptors).unwrap();

    let timer = SubtitleTimer::new(42);
    for (position, duration) in durations.iter().enumerate() {
        let index = position as u32 + 1;
        let image = store
            .put(
                &ArtifactName::for_scene(chapter_index, index, ArtifactKind::Image),
                format!("png{}", index).as_bytes(),
            )
            .await
            .unwrap();
        let audio = store
            .put(
                &ArtifactName::for_scene(chapter_index, index, ArtifactKind::Audio),
                format!("wav{}", index).as_bytes(),
            )
            .await
            .unwrap();
        let narration = chapter.scene(index).unwrap().descriptor().narration().clone();
        let track = timer.time(index, &narration, *duration).unwrap();
        let subtitle = store
            .put(
                &ArtifactName::for_scene(chapter_index, index, ArtifactKind::Subtitle),
                track.to_srt().as_bytes(),
            )
            .await
            .unwrap();

        let scene = chapter.scene_mut(index).unwrap();
        scene.set_image(image);
        scene.set_audio(AudioArtifact::new(audio, *duration));
        scene.set_subtitle(SubtitleArtifact::new(subtitle, track));
    }

    StoredChapter {
        chapter,
        prose: prose_ref,
        scenes: scenes_ref,
    }
}

//! End-to-end chapter pipeline tests against mock backends.

mod test_utils;

use storyreel_core::{
    ArtifactKind, ArtifactName, ChapterState, FailureReason, Outline, PipelineStage,
    SceneCount, SceneDescriptor, SubtitleTrack,
};
use storyreel_error::{ConfigErrorKind, StoryreelError, StoryreelErrorKind};
use storyreel_pipeline::{BatchDriver, CancelToken, chapter_status};
use storyreel_rate_limit::{LimitConfig, RateLimiter, RetryPolicy};
use storyreel_storage::{ArtifactStore, ChapterManifest, load_manifest};
use test_utils::{
    Harness, MAGE_PROSE, MockImageGenerator, MockSpeechSynthesizer, MockTextGenerator,
    mage_outline, test_config,
};

async fn manifest(store: &dyn ArtifactStore, chapter: u32) -> ChapterManifest {
    load_manifest(store, chapter)
        .await
        .expect("manifest readable")
        .expect("manifest saved")
}

fn audio_total(manifest: &ChapterManifest) -> u64 {
    manifest
        .scene_records()
        .iter()
        .filter_map(|r| r.audio().as_ref())
        .map(|a| *a.duration_ms())
        .sum()
}

#[tokio::test]
async fn test_chapter_runs_to_composed() {
    let h = Harness::new(test_config());
    let report = h
        .pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;

    assert_eq!(report.state(), &ChapterState::Composed);
    assert_eq!(*report.scenes_with_assets(), 5);
    assert_eq!(*report.scene_count(), 5);
    assert_eq!(*report.generation_calls(), 12);
    assert_eq!(h.text.prose_calls(), 1);
    assert_eq!(h.text.split_calls(), 1);
    assert_eq!(h.image.calls(), 5);
    assert_eq!(h.speech.calls(), 5);

    let m = manifest(&h.store, 1).await;
    assert_eq!(m.state(), &ChapterState::Composed);
    assert_eq!(m.scene_records().len(), 5);
    assert!(m.scene_records().iter().all(|r| r.image().is_some()
        && r.audio().is_some()
        && r.subtitle().is_some()));

    // Video length is exactly the narration length.
    let video = report.video().as_ref().expect("video recorded");
    assert_eq!(*video.duration_ms(), audio_total(&m));
    assert_eq!(video.video().name().to_string(), "ch001_video.mp4");

    // Narration spans reconstruct the prose.
    let scenes_name = ArtifactName::for_chapter(1, ArtifactKind::Scenes);
    let scenes: Vec<SceneDescriptor> =
        serde_json::from_slice(&h.store.read(&scenes_name).await.unwrap()).unwrap();
    let rebuilt: String = scenes.iter().map(|s| s.narration().as_str()).collect();
    assert_eq!(rebuilt, MAGE_PROSE);
    assert!(scenes.iter().all(|s| !s.narration().trim().is_empty()));

    // Chapter captions cover the whole video and never run past it.
    let srt = h.store.read_text(video.subtitles().name()).await.unwrap();
    let track = SubtitleTrack::from_srt(&srt).unwrap();
    assert!(track.is_well_formed(*video.duration_ms()));
    assert_eq!(track.end_ms(), *video.duration_ms());

    let requests = h.composer.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].segments().len(), 5);
}

#[tokio::test]
async fn test_failed_image_keeps_other_scenes() {
    let h = Harness::with_backends(
        test_config(),
        Default::default(),
        MockTextGenerator::new(MAGE_PROSE),
        MockImageGenerator::new().failing_scenes(vec![3]),
        MockSpeechSynthesizer::new(),
    );
    let report = h
        .pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;

    assert_eq!(
        report.state(),
        &ChapterState::failed(
            PipelineStage::Assets,
            FailureReason::IncompleteScenes { scenes: vec![3] }
        )
    );
    assert_eq!(*report.scenes_with_assets(), 4);
    // Four successes plus three attempts for scene 3.
    assert_eq!(h.image.calls(), 7);
    assert!(report.video().is_none());

    let m = manifest(&h.store, 1).await;
    assert!(matches!(m.state(), ChapterState::Failed { .. }));
    for record in m.scene_records() {
        assert_eq!(record.image().is_some(), *record.scene() != 3);
        assert!(record.audio().is_some());
    }

    // A rerun with a healthy backend only redoes the missing image.
    let rerun = h.rerun(test_config());
    let report = rerun
        .pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;
    assert_eq!(report.state(), &ChapterState::Composed);
    assert_eq!(rerun.image.calls(), 1);
    assert_eq!(rerun.speech.calls(), 0);
    assert_eq!(rerun.text.prose_calls(), 0);
    assert_eq!(rerun.text.split_calls(), 0);
}

#[tokio::test]
async fn test_composed_rerun_is_idempotent() {
    let h = Harness::new(test_config());
    let first = h
        .pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;
    assert!(first.is_composed());
    let writes = h.store.writes();

    let rerun = h.rerun(test_config());
    let second = rerun
        .pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;

    assert!(second.is_composed());
    assert_eq!(*second.generation_calls(), 0);
    assert_eq!(h.store.writes(), writes);
    assert_eq!(second.video(), first.video());
    assert_eq!(second.generation_id(), first.generation_id());
    assert!(rerun.composer.requests().is_empty());
}

#[tokio::test]
async fn test_missing_audio_is_regenerated_alone() {
    let h = Harness::new(test_config());
    h.pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;
    let before = manifest(&h.store, 1).await;
    let audio = before.scene(2).unwrap().audio().clone().unwrap();
    assert!(h.store.remove(audio.reference().name()).await);

    let rerun = h.rerun(test_config());
    let report = rerun
        .pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;

    assert!(report.is_composed());
    assert_eq!(rerun.speech.calls(), 1);
    assert_eq!(rerun.image.calls(), 0);
    assert_eq!(rerun.text.prose_calls(), 0);
    assert_eq!(rerun.composer.requests().len(), 1);

    let after = manifest(&h.store, 1).await;
    assert_eq!(after.generation_id(), before.generation_id());
    assert_eq!(after.scene(1), before.scene(1));
    assert_eq!(after.scene(2).unwrap().audio().as_ref(), Some(&audio));
}

#[tokio::test]
async fn test_corrupt_image_is_regenerated() {
    let h = Harness::new(test_config());
    h.pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;
    let image = manifest(&h.store, 1).await.scene(4).unwrap().image().clone().unwrap();
    h.store.tamper(image.name(), b"garbage".to_vec()).await;

    let rerun = h.rerun(test_config());
    let report = rerun
        .pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;

    assert!(report.is_composed());
    assert_eq!(rerun.image.calls(), 1);
    assert_eq!(rerun.speech.calls(), 0);
}

#[tokio::test]
async fn test_missing_audio_with_failing_backend_fails_assets() {
    let h = Harness::new(test_config());
    h.pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;
    let audio = manifest(&h.store, 1).await.scene(2).unwrap().audio().clone().unwrap();
    h.store.remove(audio.reference().name()).await;

    let rerun = Harness::with_backends(
        test_config(),
        h.store.clone(),
        MockTextGenerator::new(MAGE_PROSE),
        MockImageGenerator::new(),
        MockSpeechSynthesizer::failing(),
    );
    let report = rerun
        .pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;

    assert_eq!(
        report.state(),
        &ChapterState::failed(
            PipelineStage::Assets,
            FailureReason::IncompleteScenes { scenes: vec![2] }
        )
    );
    assert_eq!(rerun.speech.calls(), 3);
}

#[tokio::test]
async fn test_transient_image_errors_are_retried() {
    let h = Harness::with_backends(
        test_config(),
        Default::default(),
        MockTextGenerator::new(MAGE_PROSE),
        MockImageGenerator::new().with_transient_failures(2),
        MockSpeechSynthesizer::new(),
    );
    let report = h
        .pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;

    assert!(report.is_composed());
    assert_eq!(h.image.calls(), 7);
}

#[tokio::test]
async fn test_blank_prose_fails_with_empty_output() {
    let h = Harness::with_backends(
        test_config(),
        Default::default(),
        MockTextGenerator::new("   \n  "),
        MockImageGenerator::new(),
        MockSpeechSynthesizer::new(),
    );
    let report = h
        .pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;

    assert_eq!(
        report.state(),
        &ChapterState::failed(PipelineStage::Prose, FailureReason::EmptyOutput)
    );
    assert_eq!(h.text.prose_calls(), 2);
    assert_eq!(h.image.calls(), 0);

    // The failure is recorded even though no prose was stored.
    let m = manifest(&h.store, 1).await;
    assert_eq!(m.state(), report.state());
    assert!(m.prose().is_none());
    assert!(m.scene_records().is_empty());
    let statuses = chapter_status(&h.store, 1..=1).await.unwrap();
    assert_eq!(statuses[0].1.as_ref().map(|m| m.state()), Some(report.state()));

    // A rerun starts from scratch.
    let rerun = h.rerun(test_config());
    let report = rerun
        .pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;
    assert!(report.is_composed());
    assert_eq!(rerun.text.prose_calls(), 1);
}

#[tokio::test]
async fn test_scene_assets_run_concurrently_within_limit() {
    // Earlier scenes are slower, so scenes finish out of order.
    let h = Harness::with_backends(
        test_config().with_scene_concurrency(3),
        Default::default(),
        MockTextGenerator::new(MAGE_PROSE),
        MockImageGenerator::new().with_latency(vec![120, 90, 60, 30, 10]),
        MockSpeechSynthesizer::new(),
    );
    let report = h
        .pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;

    assert!(report.is_composed());
    let peak = h.image.peak_in_flight();
    assert!(peak > 1, "scenes should overlap, peak was {peak}");
    assert!(peak <= 3, "scene_concurrency exceeded, peak was {peak}");

    let requests = h.composer.requests();
    let order: Vec<u32> = requests[0].segments().iter().map(|s| *s.scene()).collect();
    assert_eq!(order, vec![1, 2, 3, 4, 5]);
    let m = manifest(&h.store, 1).await;
    let recorded: Vec<u32> = m.scene_records().iter().map(|r| *r.scene()).collect();
    assert_eq!(recorded, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_rate_limit_queueing_does_not_time_out_calls() {
    // One image slot and 60ms per image: the last scene queues for ~240ms,
    // far beyond the 100ms per-attempt deadline.
    let config = test_config()
        .with_scene_concurrency(5)
        .with_asset_retry(RetryPolicy::new(3, 1, 5, 100).without_jitter());
    let h = Harness::with_image_limiter(
        config,
        Default::default(),
        MockTextGenerator::new(MAGE_PROSE),
        MockImageGenerator::new().with_latency(vec![60; 5]),
        MockSpeechSynthesizer::new(),
        RateLimiter::new(LimitConfig::new(None, Some(1))),
    );
    let report = h
        .pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;

    assert_eq!(report.state(), &ChapterState::Composed);
    assert_eq!(h.image.calls(), 5, "no attempt was spent waiting for quota");
    assert_eq!(h.image.peak_in_flight(), 1);
}

#[tokio::test]
async fn test_split_count_mismatch_exhausts_stage_retries() {
    let h = Harness::with_backends(
        test_config(),
        Default::default(),
        MockTextGenerator::new(MAGE_PROSE).with_extra_scenes(1),
        MockImageGenerator::new(),
        MockSpeechSynthesizer::new(),
    );
    let report = h
        .pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;

    match report.state() {
        ChapterState::Failed {
            stage: PipelineStage::Split,
            reason: FailureReason::RetriesExhausted { attempts, .. },
        } => assert_eq!(*attempts, 2),
        other => panic!("unexpected state {other}"),
    }
    assert_eq!(h.text.split_calls(), 2);

    // Prose survives the failed split and is reused.
    let rerun = h.rerun(test_config());
    let report = rerun
        .pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;
    assert!(report.is_composed());
    assert_eq!(rerun.text.prose_calls(), 0);
    assert_eq!(rerun.text.split_calls(), 1);
}

#[tokio::test]
async fn test_scene_count_change_keeps_prose() {
    let h = Harness::new(test_config());
    h.pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;
    let before = manifest(&h.store, 1).await;

    let rerun = h.rerun(test_config().with_scene_count(SceneCount::new(6).unwrap()));
    let report = rerun
        .pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;

    assert!(report.is_composed());
    assert_eq!(*report.scene_count(), 6);
    assert_eq!(rerun.text.prose_calls(), 0);
    assert_eq!(rerun.text.split_calls(), 1);
    assert_eq!(rerun.image.calls(), 6);

    let after = manifest(&h.store, 1).await;
    assert_eq!(*after.scene_count(), 6);
    assert_eq!(after.prose(), before.prose());
}

#[tokio::test]
async fn test_force_regenerates_everything() {
    let h = Harness::new(test_config());
    h.pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;

    let rerun = h.rerun(test_config().with_force_regenerate(true));
    let report = rerun
        .pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;

    assert!(report.is_composed());
    assert_eq!(rerun.text.prose_calls(), 1);
    assert_eq!(rerun.image.calls(), 5);
    assert_eq!(rerun.speech.calls(), 5);
}

#[tokio::test]
async fn test_transition_hold_extends_video() {
    let h = Harness::new(test_config().with_transition_ms(500));
    let report = h
        .pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;

    let m = manifest(&h.store, 1).await;
    let video = report.video().as_ref().unwrap();
    assert_eq!(*video.duration_ms(), audio_total(&m) + 4 * 500);
    let segments = video.segments();
    assert_eq!(*segments[1].start_ms(), segments[0].end_ms() + 500);
}

#[tokio::test]
async fn test_overlong_chapter_fails_composition() {
    let h = Harness::new(test_config().with_max_chapter_ms(1_000));
    let report = h
        .pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;

    assert!(matches!(
        report.state(),
        ChapterState::Failed {
            stage: PipelineStage::Composition,
            reason: FailureReason::Resource { .. },
        }
    ));
    assert!(h.composer.requests().is_empty());
    // Scene assets are kept for a later run with a higher limit.
    assert_eq!(*report.scenes_with_assets(), 5);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let h = Harness::new(test_config());
    let cancel = CancelToken::new();
    cancel.cancel();

    let report = h.pipeline.run_chapter(&mage_outline(), 1, &cancel).await;

    assert_eq!(
        report.state(),
        &ChapterState::failed(PipelineStage::Prose, FailureReason::Cancelled)
    );
    assert_eq!(h.text.prose_calls(), 0);
    assert!(load_manifest(&h.store, 1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_cancelled_during_assets_stops_new_calls() {
    let cancel = CancelToken::new();
    let h = Harness::with_backends(
        test_config().with_scene_concurrency(1),
        Default::default(),
        MockTextGenerator::new(MAGE_PROSE),
        MockImageGenerator::new().cancelling(cancel.clone()),
        MockSpeechSynthesizer::new(),
    );

    let report = h.pipeline.run_chapter(&mage_outline(), 1, &cancel).await;

    assert_eq!(
        report.state(),
        &ChapterState::failed(PipelineStage::Assets, FailureReason::Cancelled)
    );
    assert_eq!(h.image.calls(), 1);
    assert!(h.speech.calls() <= 1);
    let m = manifest(&h.store, 1).await;
    assert_eq!(m.state(), report.state());
}

#[tokio::test]
async fn test_cancel_abandons_slow_backend_call() {
    let cancel = CancelToken::new();
    let h = Harness::with_backends(
        test_config().with_scene_concurrency(1),
        Default::default(),
        MockTextGenerator::new(MAGE_PROSE),
        MockImageGenerator::new().with_latency(vec![60_000; 5]),
        MockSpeechSynthesizer::new(),
    );
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let report = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        h.pipeline.run_chapter(&mage_outline(), 1, &cancel),
    )
    .await
    .expect("cancel ends the chapter without waiting for the backend");

    assert_eq!(
        report.state(),
        &ChapterState::failed(PipelineStage::Assets, FailureReason::Cancelled)
    );
    assert_eq!(h.image.calls(), 1);
}

#[tokio::test]
async fn test_user_prose_replaces_generation() {
    let dir = tempfile::tempdir().unwrap();
    let chapter_dir = dir.path().join("chapter_1");
    std::fs::create_dir_all(&chapter_dir).unwrap();
    std::fs::write(
        chapter_dir.join("index.txt"),
        "\n  The tower door was open. Mira stepped inside. Dust rose. Something moved above. She lit her palm. The staff was there.\n",
    )
    .unwrap();

    let h = Harness::new(test_config().with_user_prose_dir(Some(dir.path().to_path_buf())));
    let report = h
        .pipeline
        .run_chapter(&mage_outline(), 1, &CancelToken::new())
        .await;

    assert!(report.is_composed());
    assert_eq!(h.text.prose_calls(), 0);
    let prose = h
        .store
        .read_text(&ArtifactName::for_chapter(1, ArtifactKind::Prose))
        .await
        .unwrap();
    assert!(prose.starts_with("The tower door was open."));
    assert!(prose.ends_with("The staff was there."));
}

#[tokio::test]
async fn test_previous_chapter_feeds_prose_prompt() {
    let h = Harness::new(test_config());
    let outline = Outline::new(
        "A mage seeks a staff.\nChapter 1: She leaves home.\nChapter 2: She reaches the tower.",
    );
    h.pipeline.run_chapter(&outline, 1, &CancelToken::new()).await;
    h.pipeline.run_chapter(&outline, 2, &CancelToken::new()).await;

    let prompts = h.text.prose_prompts();
    assert_eq!(prompts.len(), 2);
    assert!(!prompts[0].contains("previous chapter"));
    assert!(prompts[1].contains("She reaches the tower."));
    assert!(prompts[1].contains("a voice called her name from the dark."));
}

#[tokio::test]
async fn test_concurrent_batch_waits_for_previous_prose() {
    let h = Harness::with_backends(
        test_config().with_chapter_concurrency(3),
        Default::default(),
        MockTextGenerator::new(MAGE_PROSE).with_prose_latency(80),
        MockImageGenerator::new(),
        MockSpeechSynthesizer::new(),
    );
    let outline = Outline::new(
        "A mage seeks a staff.\nChapter 1: She leaves home.\nChapter 2: She reaches the tower.\nChapter 3: The staff.",
    );
    let driver = BatchDriver::new(h.pipeline.clone(), outline);

    let report = driver.run(1..=3, &CancelToken::new()).await.unwrap();

    assert!(report.all_composed());
    let prompts = h.text.prose_prompts();
    assert_eq!(prompts.len(), 3);
    assert!(prompts[0].contains("She leaves home."));
    assert!(!prompts[0].contains("previous chapter"));
    for (prompt, beat) in prompts[1..].iter().zip(["She reaches the tower.", "The staff."]) {
        assert!(prompt.contains(beat));
        assert!(prompt.contains("a voice called her name from the dark."));
    }
}

#[tokio::test]
async fn test_same_chapter_runs_are_serialized() {
    let h = Harness::new(test_config());
    let outline = mage_outline();
    let cancel = CancelToken::new();

    let (a, b) = tokio::join!(
        h.pipeline.run_chapter(&outline, 1, &cancel),
        h.pipeline.run_chapter(&outline, 1, &cancel)
    );

    assert!(a.is_composed() && b.is_composed());
    let mut calls = [*a.generation_calls(), *b.generation_calls()];
    calls.sort();
    assert_eq!(calls, [0, 12]);
}

#[tokio::test]
async fn test_batch_runs_chapters_independently() {
    let h = Harness::with_backends(
        test_config().with_chapter_concurrency(2),
        Default::default(),
        MockTextGenerator::new(MAGE_PROSE),
        MockImageGenerator::new(),
        MockSpeechSynthesizer::new(),
    );
    let outline = Outline::new(
        "A mage seeks a staff.\nChapter 1: She leaves home.\nChapter 2: The bridge.\nChapter 3: The tower.",
    );
    let driver = BatchDriver::new(h.pipeline.clone(), outline);

    let report = driver.run(1..=3, &CancelToken::new()).await.unwrap();

    assert!(report.all_composed());
    let indices: Vec<u32> = report.chapters().iter().map(|c| *c.chapter()).collect();
    assert_eq!(indices, vec![1, 2, 3]);

    for chapter in 1..=3 {
        let names = h.store.list(chapter).await.unwrap();
        assert!(names.iter().all(|n| *n.chapter() == chapter));
        let m = manifest(&h.store, chapter).await;
        assert_eq!(*m.chapter(), chapter);
        assert!(m.artifact_refs().iter().all(|r| *r.name().chapter() == chapter));
    }
    let ids: std::collections::HashSet<_> = report
        .chapters()
        .iter()
        .filter_map(|c| *c.generation_id())
        .collect();
    assert_eq!(ids.len(), 3);

    let statuses = chapter_status(&h.store, 1..=4).await.unwrap();
    assert_eq!(statuses.len(), 4);
    assert!(statuses[..3].iter().all(|(_, m)| m.is_some()));
    assert!(statuses[3].1.is_none());
}

#[tokio::test]
async fn test_batch_rejects_bad_ranges() {
    fn config_kind(err: &StoryreelError) -> &ConfigErrorKind {
        match err.kind() {
            StoryreelErrorKind::Config(e) => &e.kind,
            other => panic!("unexpected error {other}"),
        }
    }

    let h = Harness::new(test_config());
    let driver = BatchDriver::new(h.pipeline.clone(), mage_outline());
    let err = driver.run(0..=2, &CancelToken::new()).await.unwrap_err();
    assert!(matches!(config_kind(&err), ConfigErrorKind::ChapterRange(_)));
    #[allow(clippy::reversed_empty_ranges)]
    let reversed = 3..=2;
    let err = driver.run(reversed, &CancelToken::new()).await.unwrap_err();
    assert!(matches!(config_kind(&err), ConfigErrorKind::ChapterRange(_)));

    let empty = BatchDriver::new(h.pipeline.clone(), Outline::new("   "));
    let err = empty.run(1..=1, &CancelToken::new()).await.unwrap_err();
    assert_eq!(config_kind(&err), &ConfigErrorKind::NoStorySource);
}

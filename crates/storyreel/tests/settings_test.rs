//! Configuration loading, CLI overrides and wiring.

use std::io::Write;
use storyreel::{
    GenerationErrorKind, RunOverrides, StoryreelConfig, StoryreelErrorKind, StyleTag,
    build_backends, load_outline, open_store,
};

#[test]
fn test_partial_document_keeps_defaults() {
    let config = StoryreelConfig::from_toml(
        r#"
        output_dir = "videos"

        [pipeline]
        scene_count = 12
        transition_ms = 400
        default_style = "realistic"

        [limits.image]
        rpm = 2
        "#,
    )
    .unwrap();

    assert_eq!(config.output_dir().to_str(), Some("videos"));
    assert_eq!(config.pipeline().scene_count().get(), 12);
    assert_eq!(*config.pipeline().transition_ms(), 400);
    assert_eq!(*config.pipeline().default_style(), StyleTag::Realistic);
    assert_eq!(*config.limits().image().rpm(), Some(2));
    // Untouched sections come from the bundled file.
    assert_eq!(*config.pipeline().subtitle_tolerance_ms(), 250);
    assert_eq!(*config.pipeline().asset_retry().max_attempts(), 4);
    assert_eq!(*config.pipeline().stage_retry().max_attempts(), 2);
    assert_eq!(config.backend().speech_model(), "tts-1");
    assert_eq!(*config.limits().speech().max_concurrent(), Some(4));
}

#[test]
fn test_scene_count_out_of_range_rejected() {
    let err = StoryreelConfig::from_toml("[pipeline]\nscene_count = 3").unwrap_err();
    assert!(matches!(err.kind(), StoryreelErrorKind::Config(_)));
}

#[test]
fn test_stage_budget_must_stay_below_asset_budget() {
    let err = StoryreelConfig::from_toml("[pipeline.stage_retry]\nmax_attempts = 4").unwrap_err();
    assert!(err.to_string().contains("stage_retry.max_attempts"));
}

#[test]
fn test_from_file_layers_over_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "[pipeline]\nvoice = \"nova\"\nscene_concurrency = 8").unwrap();

    let config = StoryreelConfig::from_file(&path).unwrap();
    assert_eq!(config.pipeline().voice(), "nova");
    assert_eq!(*config.pipeline().scene_concurrency(), 8);
    assert_eq!(config.pipeline().scene_count().get(), 5);
}

#[test]
fn test_missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(StoryreelConfig::from_file(dir.path().join("absent.toml")).is_err());
}

#[test]
fn test_overrides_clamp_scene_count() {
    let high = RunOverrides {
        scene_count: Some(80),
        ..Default::default()
    }
    .apply(StoryreelConfig::default());
    assert_eq!(high.pipeline().scene_count().get(), 50);

    let low = RunOverrides {
        scene_count: Some(2),
        ..Default::default()
    }
    .apply(StoryreelConfig::default());
    assert_eq!(low.pipeline().scene_count().get(), 5);
}

#[test]
fn test_overrides_replace_loaded_values() {
    let config = RunOverrides {
        scene_count: Some(20),
        style: Some(StyleTag::Realistic),
        output_dir: Some("elsewhere".into()),
        user_prose_dir: Some("drafts".into()),
        force: true,
    }
    .apply(StoryreelConfig::default());

    assert_eq!(config.pipeline().scene_count().get(), 20);
    assert_eq!(*config.pipeline().default_style(), StyleTag::Realistic);
    assert_eq!(config.output_dir().to_str(), Some("elsewhere"));
    assert_eq!(
        config.pipeline().user_prose_dir().as_deref(),
        Some(std::path::Path::new("drafts"))
    );
    assert!(*config.pipeline().force_regenerate());
    assert!(config.validate().is_ok());
}

#[test]
fn test_empty_overrides_change_nothing() {
    let config = StoryreelConfig::default();
    assert_eq!(RunOverrides::default().apply(config.clone()), config);
}

#[tokio::test]
async fn test_outline_from_file_and_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("outline.txt");
    std::fs::write(&path, "A mage seeks a staff.\nChapter 1: She leaves home.\n").unwrap();

    let outline = load_outline(
        Some(&path),
        Some("Chapter 2: The tower."),
        Some("  watercolor  "),
    )
    .await
    .unwrap();

    assert_eq!(outline.slice(2).beat(), Some("The tower."));
    assert_eq!(outline.slice(1).premise(), "A mage seeks a staff.");
    assert_eq!(outline.requirement().as_deref(), Some("watercolor"));
}

#[tokio::test]
async fn test_missing_outline_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_outline(Some(&dir.path().join("nope.txt")), None, None).await;
    assert!(matches!(
        result.unwrap_err().kind(),
        StoryreelErrorKind::Storage(_)
    ));
}

#[tokio::test]
async fn test_no_outline_sources_gives_empty_outline() {
    let outline = load_outline(None, None, None).await.unwrap();
    assert!(outline.is_empty());
}

#[test]
fn test_store_created_under_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoryreelConfig::default().with_output_dir(dir.path().join("out"));
    let store = open_store(&config).unwrap();
    assert!(store.base_path().is_dir());
}

#[test]
fn test_backends_need_api_key() {
    let config = StoryreelConfig::from_toml(
        "[backend]\napi_key_env = \"STORYREEL_TEST_KEY_THAT_IS_NEVER_SET\"",
    )
    .unwrap();
    let err = build_backends(&config).unwrap_err();
    let generation = err.as_generation().expect("generation error");
    assert!(matches!(
        generation.kind,
        GenerationErrorKind::MissingApiKey(_)
    ));
}

//! Chapter status command handler.

use super::StatusArgs;
use storyreel::{
    JsonError, JsonErrorKind, StoryreelConfig, StoryreelResult, chapter_status, open_store,
};

/// Print the recorded state of each chapter in range.
pub async fn show_status(config: StoryreelConfig, args: &StatusArgs) -> StoryreelResult<()> {
    let config = match &args.output {
        Some(dir) => config.with_output_dir(dir.clone()),
        None => config,
    };
    let store = open_store(&config)?;
    let statuses = chapter_status(&store, args.start..=args.end).await?;

    if args.json {
        let manifests: Vec<_> = statuses.iter().filter_map(|(_, m)| m.as_ref()).collect();
        let json = serde_json::to_string_pretty(&manifests)
            .map_err(|e| JsonError::new(JsonErrorKind::StatusReport(e.to_string())))?;
        println!("{json}");
        return Ok(());
    }

    for (chapter, manifest) in statuses {
        match manifest {
            Some(manifest) => {
                let with_assets = manifest
                    .scene_records()
                    .iter()
                    .filter(|r| r.image().is_some() && r.audio().is_some())
                    .count();
                println!(
                    "chapter {:>3}: {} ({}/{} scenes with assets, updated {})",
                    chapter,
                    manifest.state(),
                    with_assets,
                    manifest.scene_count(),
                    manifest.updated_at().format("%Y-%m-%d %H:%M:%S")
                );
            }
            None => println!("chapter {:>3}: not started", chapter),
        }
    }
    Ok(())
}

//! Chapter generation command handler.

use super::RunArgs;
use storyreel::{
    BatchDriver, BatchReport, CancelToken, StoryreelConfig, StoryreelResult, build_backends,
    build_pipeline, load_outline,
};
use tracing::{info, warn};

/// Generate the requested chapters.
///
/// Ctrl-C cancels the batch; chapters stop at their next checkpoint and keep
/// everything already written.
pub async fn run_chapters(config: StoryreelConfig, args: &RunArgs) -> StoryreelResult<BatchReport> {
    let config = args.overrides().apply(config);
    config.validate()?;

    let outline = load_outline(
        args.outline_file.as_deref(),
        args.outline.as_deref(),
        args.requirement.as_deref(),
    )
    .await?;

    let pipeline = build_pipeline(&config, build_backends(&config)?)?;
    let driver = BatchDriver::new(pipeline, outline);

    let cancel = CancelToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight chapters");
            signal.cancel();
        }
    });

    info!(
        output = %config.output_dir().display(),
        scene_count = config.pipeline().scene_count().get(),
        "Generating chapters"
    );
    let report = driver.run(args.chapters(), &cancel).await?;

    for chapter in report.chapters() {
        println!("{chapter}");
    }
    Ok(report)
}

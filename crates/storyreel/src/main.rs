//! storyreel CLI binary.
//!
//! - `storyreel run` generates a range of chapters
//! - `storyreel status` prints what each chapter's manifest records

use clap::Parser;
use std::process::ExitCode;
use storyreel::{LogConfig, StoryreelConfig, init_logging};

mod cli;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    use cli::{Cli, Commands, run_chapters, show_status};

    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(&LogConfig::new(cli.verbose).with_json(cli.json_logs))?;

    let config = match &cli.config {
        Some(path) => StoryreelConfig::from_file(path)?,
        None => StoryreelConfig::load()?,
    };

    match &cli.command {
        Commands::Run(args) => {
            let report = run_chapters(config, args).await?;
            if !report.all_composed() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Status(args) => {
            show_status(config, args).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

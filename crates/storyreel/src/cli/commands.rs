//! CLI command definitions.

use clap::{Args, Parser, Subcommand};
use std::ops::RangeInclusive;
use std::path::PathBuf;
use storyreel::{RunOverrides, StyleTag};

/// storyreel - narrated, subtitled chapter videos from a story outline
#[derive(Parser, Debug)]
#[command(name = "storyreel")]
#[command(about = "Generate narrated, subtitled chapter videos from a story outline", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Configuration file used instead of ./storyreel.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate chapters
    Run(RunArgs),

    /// Show the recorded state of chapters
    Status(StatusArgs),
}

/// Arguments for `storyreel run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// First chapter to generate
    #[arg(long, default_value_t = 1)]
    pub start: u32,

    /// Last chapter to generate (defaults to --start)
    #[arg(long)]
    pub end: Option<u32>,

    /// Story outline file
    #[arg(long)]
    pub outline_file: Option<PathBuf>,

    /// Story outline text
    #[arg(long)]
    pub outline: Option<String>,

    /// Style requirement added to every prompt (e.g., "watercolor, no gore")
    #[arg(long)]
    pub requirement: Option<String>,

    /// Scenes per chapter, clamped to 5..=50
    #[arg(long)]
    pub scene_count: Option<u32>,

    /// Default scene style
    #[arg(long)]
    pub style: Option<StyleTag>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory of user-written chapters (chapter_N/index.txt)
    #[arg(long)]
    pub user_prose_dir: Option<PathBuf>,

    /// Regenerate every artifact even when valid ones exist
    #[arg(long)]
    pub force: bool,
}

impl RunArgs {
    /// Chapters to generate.
    pub fn chapters(&self) -> RangeInclusive<u32> {
        self.start..=self.end.unwrap_or(self.start)
    }

    /// Values overriding the loaded configuration.
    pub fn overrides(&self) -> RunOverrides {
        RunOverrides {
            scene_count: self.scene_count,
            style: self.style,
            output_dir: self.output.clone(),
            user_prose_dir: self.user_prose_dir.clone(),
            force: self.force,
        }
    }
}

/// Arguments for `storyreel status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// First chapter to show
    #[arg(long, default_value_t = 1)]
    pub start: u32,

    /// Last chapter to show
    #[arg(long)]
    pub end: u32,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print manifests as JSON
    #[arg(long)]
    pub json: bool,
}

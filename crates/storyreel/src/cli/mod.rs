//! Command-line interface for the storyreel binary.

mod commands;
mod run;
mod status;

pub use commands::{Cli, Commands, RunArgs, StatusArgs};
pub use run::run_chapters;
pub use status::show_status;

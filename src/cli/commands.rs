//! CLI command definitions

use clap::Args;
use std::path::PathBuf;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file, `-` for standard input
    pub file: String,

    /// Runtime arguments (key=value), available as `runtime.arguments.key`
    #[arg(short = 'a', long = "argument", value_name = "KEY=VALUE")]
    pub arguments: Vec<String>,

    /// Bind everything but only run pipes that support dry runs
    #[arg(long)]
    pub dry_run: bool,
}

/// Run a single pipe from standard input to standard output
#[derive(Debug, Args, Clone)]
pub struct PipeCommand {
    /// Name of the pipe
    pub name: String,

    /// Runtime arguments (key=value), available as `runtime.arguments.key`
    #[arg(short = 'a', long = "argument", value_name = "KEY=VALUE")]
    pub arguments: Vec<String>,
}

/// List available pipes
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Create the source file of a new pipe
#[derive(Debug, Args, Clone)]
pub struct NewPipeCommand {
    /// Path of the new file, its stem is the pipe name
    pub path: PathBuf,

    /// Overwrite an existing file
    #[arg(short, long)]
    pub force: bool,
}

/// Validate a log level name
pub fn parse_log_level(s: &str) -> Result<String, String> {
    match crate::core::config::parse_level(s) {
        Some(_) => Ok(s.to_ascii_lowercase()),
        None => Err(format!(
            "invalid log level: {} (one among: trace, debug, info, warning, error, critical)",
            s
        )),
    }
}

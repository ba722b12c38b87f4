//! Command-line interface

pub mod commands;
pub mod logging;
pub mod output;
pub mod scaffold;

use clap::{Parser, Subcommand};
use commands::{parse_log_level, ListCommand, NewPipeCommand, PipeCommand, RunCommand};
use std::ffi::OsString;

/// Compose small processing pipes over a shared state
#[derive(Debug, Parser, Clone)]
#[command(name = "elastic-pipes")]
#[command(version)]
#[command(about = "Compose small processing pipes over a shared state", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Default log level, `RUST_LOG` takes precedence
    #[arg(long, global = true, default_value = "info", value_parser = parse_log_level)]
    pub log_level: String,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a pipeline
    Run(RunCommand),

    /// Run a single pipe in UNIX pipe mode
    Pipe(PipeCommand),

    /// List available pipes
    List(ListCommand),

    /// Create a new pipe
    NewPipe(NewPipeCommand),

    /// Print the version
    Version,
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

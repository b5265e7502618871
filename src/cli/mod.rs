//! CLI command implementations

pub mod backends;
pub mod error;
pub mod run;

use clap::{Parser, Subcommand};

pub use backends::BackendsCommand;
pub use error::CliError;
pub use run::RunCommand;

/// Collector Jobs CLI
#[derive(Parser, Debug)]
#[command(name = "collector-jobs")]
#[command(about = "Run resumable data collection jobs", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a collection job
    Run(RunCommand),

    /// List registered backends
    Backends(BackendsCommand),
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

//! CLI definitions for Cadence.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Cadence CLI.
#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Distributed cron and one-shot task scheduler")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/cadence.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the scheduler and worker pool in foreground (default)
    Run,

    /// Validate schedule expressions and print their upcoming fire times
    Validate {
        /// Expressions forming one trigger set
        #[arg(required = true, num_args = 1..)]
        expressions: Vec<String>,

        /// Number of upcoming fire times to print
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
    },

    /// Check a configuration file without running anything
    Check,
}

//! Cadence - distributed cron and one-shot task scheduler
//!
//! Main entry point for the Cadence CLI.

mod adapters;
mod cli;
mod cmd_validate;
mod server;

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use cadence_config::ConfigLoader;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config_path = PathBuf::from(ConfigLoader::expand_path(&cli.config.to_string_lossy()));

    match cli.command {
        None | Some(Commands::Run) => {
            server::init_tracing()?;
            let config = ConfigLoader::load_or_default(&config_path)?;
            info!(config = %config_path.display(), "Configuration loaded");
            server::run_server(config).await
        }
        Some(Commands::Validate { expressions, count }) => {
            cmd_validate::validate_expressions(&expressions, count)
        }
        Some(Commands::Check) => cmd_validate::check_config(&config_path),
    }
}

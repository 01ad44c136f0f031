//! Keel CLI
//!
//! Command-line interface for linting, saving and running workflows and for
//! inspecting scheduled triggers.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "keel")]
#[command(about = "Keel workflow and trigger CLI", long_about = None)]
struct Cli {
    /// Orchestrator URL
    #[arg(
        long,
        env = "KEEL_ORCHESTRATOR_URL",
        default_value = "http://localhost:8080"
    )]
    orchestrator_url: String,

    /// Platform URL
    #[arg(long, env = "KEEL_PLATFORM_URL", default_value = "http://localhost:8000")]
    platform_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        orchestrator_url: cli.orchestrator_url,
        platform_url: cli.platform_url,
    };

    handle_command(cli.command, &config).await
}

//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod cron;
mod workflow;

pub use cron::CronCommands;
pub use workflow::WorkflowCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Workflow management
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommands,
    },
    /// Scheduled trigger inspection
    Cron {
        #[command(subcommand)]
        command: CronCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Workflow { command } => workflow::handle_workflow_command(command, config).await,
        Commands::Cron { command } => cron::handle_cron_command(command, config).await,
    }
}

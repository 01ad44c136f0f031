//! Cron command handlers
//!
//! Read-only views of the triggers the platform persists.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use keel_core::domain::trigger::{Schedule, Trigger, TriggerKind};

use crate::config::Config;

/// Cron subcommands
#[derive(Subcommand)]
pub enum CronCommands {
    /// List the triggers owned by one entity
    List {
        /// Trigger kind (workflow, test, env_analysis, env_sleep, release_plan)
        kind: TriggerKind,
        /// Owning entity name
        name: String,
    },
    /// List every enabled trigger
    Enabled,
    /// List triggers the scheduler re-registers on start
    Failsafe,
}

/// Handle cron commands
pub async fn handle_cron_command(command: CronCommands, config: &Config) -> Result<()> {
    let client = config.platform_client();

    let triggers = match command {
        CronCommands::List { kind, name } => client.list_triggers(kind, &name).await?,
        CronCommands::Enabled => client.list_enabled_triggers().await?,
        CronCommands::Failsafe => client.list_failsafe_triggers().await?,
    };

    if triggers.is_empty() {
        println!("{}", "No triggers found.".yellow());
    } else {
        println!("{}", format!("Found {} trigger(s):", triggers.len()).bold());
        println!();
        for trigger in &triggers {
            print_trigger_summary(trigger);
        }
    }

    Ok(())
}

fn print_trigger_summary(trigger: &Trigger) {
    let state = if trigger.enabled {
        "enabled".green()
    } else {
        "disabled".red()
    };

    println!("  {} {} {}", "▸".cyan(), trigger.name.bold(), state);
    println!("    ID:       {}", trigger.id.dimmed());
    println!("    Kind:     {}", trigger.kind());
    println!("    Schedule: {}", describe_schedule(&trigger.schedule));
    println!();
}

/// Human-readable form of a schedule
fn describe_schedule(schedule: &Schedule) -> String {
    match schedule {
        Schedule::Crontab { cron } => format!("cron '{}'", cron),
        Schedule::Timing { time, frequency } => {
            format!("at {} every {:?}", time, frequency).to_lowercase()
        }
        Schedule::Gap { frequency, number } => {
            format!("every {} {:?}", number, frequency).to_lowercase()
        }
        Schedule::UnixStamp { unix_stamp } => match schedule.instant() {
            Some(at) => format!("once at {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
            None => format!("once at invalid instant {}", unix_stamp),
        },
    }
}

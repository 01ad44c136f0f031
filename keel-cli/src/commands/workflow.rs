//! Workflow command handlers
//!
//! Lint, save, inspect, prepare and run workflows through the orchestrator.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use keel_core::domain::task::WorkflowTask;
use keel_core::domain::workflow::Workflow;
use keel_core::dto::workflow::CreateTask;

use crate::config::Config;
use keel_client::{ClientError, PlatformClient};

/// Workflow subcommands
#[derive(Subcommand)]
pub enum WorkflowCommands {
    /// Lint a workflow definition file without saving it
    Lint {
        /// Path to a JSON workflow definition
        file: String,
    },
    /// Lint and save a workflow definition file
    Save {
        /// Path to a JSON workflow definition
        file: String,
    },
    /// Show a saved workflow
    Show {
        /// Workflow name
        name: String,
    },
    /// Apply presets and options to a definition file and print the result
    Preset {
        /// Path to a JSON workflow definition
        file: String,

        /// Also drop the current selections
        #[arg(long)]
        reset_selection: bool,
    },
    /// Compile a saved workflow into a run
    Run {
        /// Workflow name
        name: String,

        /// Task ID assigned to the run
        #[arg(short, long)]
        task_id: i64,

        /// Path to a JSON workflow holding per-run overrides
        #[arg(short, long)]
        args: Option<String>,
    },
}

/// Handle workflow commands
pub async fn handle_workflow_command(command: WorkflowCommands, config: &Config) -> Result<()> {
    let client = config.orchestrator_client();

    match command {
        WorkflowCommands::Lint { file } => lint_workflow(&client, &file).await,
        WorkflowCommands::Save { file } => save_workflow(&client, &file).await,
        WorkflowCommands::Show { name } => show_workflow(&client, &name).await,
        WorkflowCommands::Preset {
            file,
            reset_selection,
        } => preset_workflow(&client, &file, reset_selection).await,
        WorkflowCommands::Run {
            name,
            task_id,
            args,
        } => run_workflow(&client, &name, task_id, args.as_deref()).await,
    }
}

/// Read a workflow definition from a JSON file
fn read_workflow(path: &str) -> Result<Workflow> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read workflow file: {}", path))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse workflow file: {}", path))
}

async fn lint_workflow(client: &PlatformClient, path: &str) -> Result<()> {
    let workflow = read_workflow(path)?;
    let report = client.lint_workflow(&workflow).await?;

    if report.valid {
        println!(
            "{}",
            format!("✓ Workflow {} is valid", report.workflow_name)
                .green()
                .bold()
        );
        Ok(())
    } else {
        println!(
            "{}",
            format!("✗ Workflow {} is invalid", report.workflow_name)
                .red()
                .bold()
        );
        if let Some(error) = &report.error {
            println!("  {}", error);
        }
        anyhow::bail!("lint failed")
    }
}

async fn save_workflow(client: &PlatformClient, path: &str) -> Result<()> {
    let workflow = read_workflow(path)?;
    let saved = client.save_workflow(&workflow).await?;

    println!("{}", "✓ Workflow saved successfully!".green().bold());
    println!("  Name:   {}", saved.name.cyan());
    println!("  Stages: {}", saved.stages.len().to_string().dimmed());
    println!("  Jobs:   {}", saved.jobs().count().to_string().dimmed());

    Ok(())
}

async fn show_workflow(client: &PlatformClient, name: &str) -> Result<()> {
    let workflow = client
        .find_saved_workflow(name)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Workflow {} not found", name))?;

    print_workflow_details(&workflow);

    Ok(())
}

async fn preset_workflow(client: &PlatformClient, path: &str, reset_selection: bool) -> Result<()> {
    let workflow = read_workflow(path)?;
    let prepared = client.preset_workflow(&workflow, reset_selection).await?;

    println!("{}", serde_json::to_string_pretty(&prepared)?);

    Ok(())
}

async fn run_workflow(
    client: &PlatformClient,
    name: &str,
    task_id: i64,
    args_path: Option<&str>,
) -> Result<()> {
    let args = args_path.map(read_workflow).transpose()?;
    let req = CreateTask { task_id, args };

    let task = client
        .create_task(name, &req)
        .await
        .map_err(|e| task_error(name, e))?;

    println!("{}", "✓ Task created successfully!".green().bold());
    print_task(&task);

    Ok(())
}

/// Turn a missing workflow into a hint instead of a raw API error
fn task_error(name: &str, err: ClientError) -> anyhow::Error {
    if err.is_not_found() {
        anyhow::anyhow!(
            "Workflow {} is not saved; save it with `keel workflow save <file>` first",
            name
        )
    } else {
        err.into()
    }
}

/// Print detailed workflow information
fn print_workflow_details(workflow: &Workflow) {
    println!("{}", "Workflow Details:".bold());
    println!("  Name:    {}", workflow.name.bold());
    if let Some(display_name) = &workflow.display_name {
        println!("  Display: {}", display_name);
    }

    for stage in &workflow.stages {
        let mode = if stage.parallel { "parallel" } else { "serial" };
        println!();
        println!("  {} {} {}", "▸".cyan(), stage.name.bold(), mode.dimmed());
        for job in &stage.jobs {
            println!("    - {} {}", job.name, format!("({})", job.kind).dimmed());
        }
    }
}

/// Print a compiled task graph
fn print_task(task: &WorkflowTask) {
    println!("  Workflow: {}", task.workflow_name.cyan());
    println!("  Task ID:  {}", task.task_id.to_string().cyan());

    for stage in &task.stages {
        println!();
        println!("  {} {}", "▸".cyan(), stage.name.bold());
        for compiled in &stage.tasks {
            println!(
                "    - {} {}",
                compiled.name,
                format!("key={} timeout={}", compiled.key, compiled.timeout).dimmed()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_error_explains_missing_workflow() {
        let err = task_error("release", ClientError::api_error(404, "Workflow release not found"));
        assert!(err.to_string().contains("keel workflow save"));

        let err = task_error("release", ClientError::api_error(400, "lint failed"));
        assert!(err.to_string().contains("lint failed"));
    }
}

//! Workflow DTOs for inter-service communication

use serde::{Deserialize, Serialize};

use crate::domain::workflow::Workflow;

/// Request to compile a saved workflow into a runnable task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    pub task_id: i64,
    /// Per-run overrides, matched to saved jobs by name
    #[serde(default)]
    pub args: Option<Workflow>,
}

/// Outcome of linting a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LintReport {
    pub workflow_name: String,
    pub valid: bool,
    #[serde(default)]
    pub error: Option<String>,
}

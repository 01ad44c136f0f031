//! Workflow API Handlers
//!
//! HTTP endpoints for saving, linting, preparing and running workflows.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use keel_core::domain::task::WorkflowTask;
use keel_core::domain::workflow::Workflow;
use keel_core::dto::workflow::{CreateTask, LintReport};
use serde::Deserialize;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// PUT /api/workflow
/// Lint and save a workflow definition
pub async fn save_workflow(
    State(state): State<AppState>,
    Json(workflow): Json<Workflow>,
) -> ApiResult<Json<Workflow>> {
    tracing::info!("Saving workflow: {}", workflow.name);

    state.compiler.save_workflow(&workflow).await?;

    Ok(Json(workflow))
}

/// GET /api/workflow/{name}
/// Get the saved definition of a workflow
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Workflow>> {
    tracing::debug!("Getting workflow: {}", name);

    let workflow = state.compiler.find_workflow(&name).await?;

    Ok(Json(workflow))
}

/// POST /api/workflow/lint
/// Lint a workflow without saving it
pub async fn lint_workflow(
    State(state): State<AppState>,
    Json(workflow): Json<Workflow>,
) -> ApiResult<Json<LintReport>> {
    tracing::debug!("Linting workflow: {}", workflow.name);

    let error = match state.compiler.lint_workflow(&workflow).await {
        Ok(()) => None,
        Err(e) if e.is_validation() => Some(e.to_string()),
        Err(e) => return Err(e.into()),
    };

    Ok(Json(LintReport {
        workflow_name: workflow.name,
        valid: error.is_none(),
        error,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct PresetQuery {
    /// Also drop the current selections
    #[serde(default)]
    pub reset_selection: bool,
}

/// POST /api/workflow/preset
/// Prepare a workflow for display
pub async fn preset_workflow(
    State(state): State<AppState>,
    Query(query): Query<PresetQuery>,
    Json(mut workflow): Json<Workflow>,
) -> ApiResult<Json<Workflow>> {
    tracing::debug!("Preparing workflow: {}", workflow.name);

    state
        .compiler
        .prepare_workflow(&mut workflow, query.reset_selection)
        .await?;

    Ok(Json(workflow))
}

/// POST /api/workflow/latest
/// Reconcile an edited workflow with its latest saved definition
pub async fn refresh_workflow(
    State(state): State<AppState>,
    Json(mut workflow): Json<Workflow>,
) -> ApiResult<Json<Workflow>> {
    tracing::debug!("Reconciling workflow: {}", workflow.name);

    state
        .compiler
        .update_with_latest_settings(&mut workflow)
        .await?;

    Ok(Json(workflow))
}

/// POST /api/workflow/{name}/task
/// Compile a saved workflow into a run
pub async fn create_task(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<CreateTask>,
) -> ApiResult<Json<WorkflowTask>> {
    tracing::info!("Creating task {} for workflow {}", req.task_id, name);

    let task = state
        .compiler
        .create_task(&name, req.args.as_ref(), req.task_id)
        .await?;

    Ok(Json(task))
}

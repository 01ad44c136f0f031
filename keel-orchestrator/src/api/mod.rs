//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod workflow;

use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::service::workflow_service::WorkflowCompiler;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub compiler: Arc<WorkflowCompiler>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        // Workflow endpoints
        .route("/workflow", put(workflow::save_workflow))
        .route("/workflow/lint", post(workflow::lint_workflow))
        .route("/workflow/preset", post(workflow::preset_workflow))
        .route("/workflow/latest", post(workflow::refresh_workflow))
        .route("/workflow/{name}", get(workflow::get_workflow))
        .route("/workflow/{name}/task", post(workflow::create_task));

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .nest("/api", api)
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

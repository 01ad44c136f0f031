//! Cronjob API Handlers

use axum::{Json, extract::State, http::StatusCode};
use keel_core::dto::cronjob::{CronjobMessage, RegisteredTriggers};

use crate::api::AppState;
use crate::api::error::ApiResult;

/// POST /cronjob
/// Apply trigger change notifications from the platform
pub async fn handle_messages(
    State(state): State<AppState>,
    Json(messages): Json<Vec<CronjobMessage>>,
) -> ApiResult<StatusCode> {
    tracing::debug!("Received {} cronjob message(s)", messages.len());

    state.handler.handle_messages(&messages).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /cronjob/registered
/// List the trigger IDs held by each engine
pub async fn list_registered(State(state): State<AppState>) -> Json<RegisteredTriggers> {
    Json(state.engines.registered().await)
}

//! Keel Orchestrator
//!
//! Stores workflow definitions and compiles them into runnable task graphs.
//!
//! Architecture:
//! - Jobs: one variant per job kind behind a shared lifecycle trait
//! - Services: workflow-level lint, reconciliation and compilation
//! - Repositories: Postgres persistence of saved workflows
//! - Collaborators: platform cluster state, user groups, edition licensing

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod collaborator;
pub mod config;
pub mod db;
pub mod error;
pub mod job;
pub mod repository;
pub mod service;

use crate::collaborator::{Collaborators, EditionLicense};
use crate::config::Config;
use crate::repository::PgWorkflowStore;
use crate::service::workflow_service::WorkflowCompiler;
use keel_client::PlatformClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keel_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Keel Orchestrator...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        "Loaded configuration: platform_url={}, edition={:?}",
        config.platform_url,
        config.edition
    );

    tracing::info!("Connecting to database...");

    // Create database connection pool
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Database connection pool created");

    // Run migrations
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let platform = Arc::new(PlatformClient::new(config.platform_url.clone()));
    let collaborators = Collaborators {
        store: Arc::new(PgWorkflowStore::new(pool)),
        cluster: platform.clone(),
        license: Arc::new(EditionLicense::new(config.edition)),
        users: platform,
    };

    // Build router with all API endpoints
    let app = api::create_router(api::AppState {
        compiler: Arc::new(WorkflowCompiler::new(collaborators)),
    });

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}

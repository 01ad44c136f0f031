//! Keel Scheduler
//!
//! Fires scheduled triggers against the platform.
//!
//! Architecture:
//! - Engines: one recurring (cron) and one one-shot (instant) scheduler
//! - Handler: applies enable/disable messages pushed by the platform
//! - Recovery: rebuilds every registration from the platform on start
//! - Actions: the platform call each trigger kind makes when it fires

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod action;
mod api;
mod config;
mod engine;
mod error;
mod handler;
mod platform;
mod recovery;
mod schedule;

use crate::config::Config;
use crate::engine::Engines;
use crate::handler::CronjobHandler;
use keel_client::PlatformClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keel_scheduler=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Keel Scheduler");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    info!(
        "Loaded configuration: platform_url={}, init_timeout={:?}",
        config.platform_url, config.init_timeout
    );

    // Startup fetches and fired actions retry differently
    let init_client = PlatformClient::new(config.platform_url.clone()).with_retry(config.init_retry);
    let action_client =
        Arc::new(PlatformClient::new(config.platform_url.clone()).with_retry(config.action_retry));

    let engines = Arc::new(
        Engines::new(action_client.clone())
            .await
            .context("Failed to create scheduling engines")?,
    );
    engines
        .start()
        .await
        .context("Failed to start scheduling engines")?;

    if let Err(e) = recovery::recover(&init_client, &engines, config.init_timeout).await {
        error!("Trigger recovery failed, exiting: {}", e);
        return Err(e.into());
    }

    let handler = Arc::new(CronjobHandler::new(engines.clone(), action_client));
    let app = api::create_router(api::AppState {
        handler,
        engines: engines.clone(),
    });

    info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
        .context("Failed to start server")?;

    info!("Shutting down");
    engines.stop().await.context("Failed to stop scheduling engines")?;

    Ok(())
}

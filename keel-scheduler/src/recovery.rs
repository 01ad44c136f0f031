//! Startup recovery
//!
//! Rebuilds the engines from the platform on start. The enabled list and
//! the failsafe list are fetched concurrently, each under its own timeout,
//! and each batch is registered as soon as it arrives. A trigger that fails
//! to register is logged and skipped.

use keel_core::domain::trigger::Trigger;
use std::future::Future;
use std::time::Duration;

use crate::engine::Engines;
use crate::error::{Result, SchedulerError};
use crate::platform::TriggerSource;

/// Counts from one recovery pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    pub registered: usize,
    pub skipped: usize,
}

impl RecoveryReport {
    fn merge(self, other: RecoveryReport) -> RecoveryReport {
        RecoveryReport {
            registered: self.registered + other.registered,
            skipped: self.skipped + other.skipped,
        }
    }
}

/// Fetch and register every trigger the platform considers active
///
/// # Errors
/// `InitTimeout` when either list does not arrive within `timeout`, `Fetch`
/// when a fetch fails outright. Both are fatal to the scheduler.
pub async fn recover(
    source: &dyn TriggerSource,
    engines: &Engines,
    timeout: Duration,
) -> Result<RecoveryReport> {
    tracing::info!("Recovering triggers from the platform...");

    let (enabled, failsafe) = tokio::join!(
        fetch_and_register("enabled", source.list_enabled_triggers(), engines, timeout),
        fetch_and_register("failsafe", source.list_failsafe_triggers(), engines, timeout),
    );

    let report = enabled?.merge(failsafe?);
    tracing::info!(
        "Trigger recovery complete: {} registered, {} skipped",
        report.registered,
        report.skipped
    );
    Ok(report)
}

async fn fetch_and_register(
    list: &'static str,
    fetch: impl Future<Output = anyhow::Result<Vec<Trigger>>>,
    engines: &Engines,
    timeout: Duration,
) -> Result<RecoveryReport> {
    let triggers = tokio::time::timeout(timeout, fetch)
        .await
        .map_err(|_| SchedulerError::InitTimeout {
            list,
            after: timeout,
        })?
        .map_err(|e| SchedulerError::Fetch(format!("{} list: {:#}", list, e)))?;

    tracing::info!("Fetched {} {} trigger(s)", triggers.len(), list);

    let mut report = RecoveryReport::default();
    for trigger in &triggers {
        match engines.register(trigger).await {
            Ok(()) => report.registered += 1,
            Err(e) => {
                tracing::warn!("Skipping trigger {}: {}", trigger.id, e);
                report.skipped += 1;
            }
        }
    }
    Ok(report)
}

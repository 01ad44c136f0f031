//! Scheduler error types

use std::time::Duration;
use thiserror::Error;

/// Failure to register a single trigger
///
/// Logged and skipped during startup recovery, returned to the caller
/// everywhere else.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("invalid schedule for trigger {id}: {reason}")]
    InvalidSchedule { id: String, reason: String },

    #[error("engine rejected trigger {id}: {reason}")]
    Engine { id: String, reason: String },
}

impl RegistrationError {
    pub fn invalid(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSchedule {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The platform did not answer during startup
    #[error("no {list} trigger list within {after:?}")]
    InitTimeout { list: &'static str, after: Duration },

    #[error("failed to fetch triggers: {0}")]
    Fetch(String),

    #[error("scheduler engine error: {0}")]
    Engine(String),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// Triggers were stopped locally but the platform kept them enabled
    #[error("failed to disable triggers of {name}: {reason}")]
    Disable { name: String, reason: String },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

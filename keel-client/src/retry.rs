//! Retry policy for outbound platform calls

use std::time::Duration;

/// Bounded retry with a fixed wait between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one
    pub max_retries: u32,
    /// Wait between attempts
    pub wait: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, wait: Duration) -> Self {
        Self { max_retries, wait }
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(3))
    }
}

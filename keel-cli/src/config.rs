//! Configuration module
//!
//! Handles CLI configuration: where the orchestrator and the platform live.

use keel_client::{PlatformClient, RetryPolicy};

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the orchestrator service
    pub orchestrator_url: String,
    /// URL of the platform API (trigger listings)
    pub platform_url: String,
}

impl Config {
    /// Client for the orchestrator's workflow endpoints
    pub fn orchestrator_client(&self) -> PlatformClient {
        interactive_client(&self.orchestrator_url)
    }

    /// Client for the platform's trigger listings
    pub fn platform_client(&self) -> PlatformClient {
        interactive_client(&self.platform_url)
    }
}

/// Commands report failures straight to the user instead of retrying
fn interactive_client(url: &str) -> PlatformClient {
    PlatformClient::new(url).with_retry(RetryPolicy::none())
}

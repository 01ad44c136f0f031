//! Scheduler configuration
//!
//! Platform connection, bind address, and the timeouts and retry policies
//! of the two outbound call paths (startup recovery and fired actions).

use keel_client::RetryPolicy;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Platform base URL (e.g., "http://localhost:8000")
    pub platform_url: String,

    /// Address the cronjob API listens on
    pub bind_addr: String,

    /// How long each startup fetch may take before the scheduler gives up
    pub init_timeout: Duration,

    /// Retry policy of the startup fetches
    pub init_retry: RetryPolicy,

    /// Retry policy of remote actions and message-driven platform calls
    pub action_retry: RetryPolicy,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - KEEL_PLATFORM_URL (optional, default: http://localhost:8000)
    /// - SCHEDULER_BIND_ADDR (optional, default: 0.0.0.0:8090)
    /// - INIT_TIMEOUT (optional, seconds, default: 300)
    /// - INIT_RETRY_COUNT (optional, default: 100)
    /// - INIT_RETRY_WAIT (optional, seconds, default: 3)
    /// - ACTION_RETRY_COUNT (optional, default: 3)
    /// - ACTION_RETRY_WAIT (optional, seconds, default: 3)
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let platform_url =
            std::env::var("KEEL_PLATFORM_URL").unwrap_or(defaults.platform_url);

        let bind_addr = std::env::var("SCHEDULER_BIND_ADDR").unwrap_or(defaults.bind_addr);

        let init_timeout = env_parse::<u64>("INIT_TIMEOUT")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.init_timeout);

        let init_retry = RetryPolicy::new(
            env_parse("INIT_RETRY_COUNT")?.unwrap_or(defaults.init_retry.max_retries),
            env_parse::<u64>("INIT_RETRY_WAIT")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.init_retry.wait),
        );

        let action_retry = RetryPolicy::new(
            env_parse("ACTION_RETRY_COUNT")?.unwrap_or(defaults.action_retry.max_retries),
            env_parse::<u64>("ACTION_RETRY_WAIT")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.action_retry.wait),
        );

        Ok(Self {
            platform_url,
            bind_addr,
            init_timeout,
            init_retry,
            action_retry,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.platform_url.is_empty() {
            anyhow::bail!("platform_url cannot be empty");
        }

        if !self.platform_url.starts_with("http://") && !self.platform_url.starts_with("https://")
        {
            anyhow::bail!("platform_url must start with http:// or https://");
        }

        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if self.init_timeout.is_zero() {
            anyhow::bail!("init_timeout must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            platform_url: "http://localhost:8000".to_string(),
            bind_addr: "0.0.0.0:8090".to_string(),
            init_timeout: Duration::from_secs(300),
            init_retry: RetryPolicy::new(100, Duration::from_secs(3)),
            action_retry: RetryPolicy::default(),
        }
    }
}

/// Parse an optional numeric variable, rejecting garbage instead of ignoring it
fn env_parse<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", key, value, e)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.init_timeout, Duration::from_secs(300));
        assert_eq!(config.init_retry.max_retries, 100);
        assert_eq!(config.init_retry.wait, Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.platform_url = "localhost:8000".to_string();
        assert!(config.validate().is_err());

        config.platform_url = "https://platform.internal".to_string();
        assert!(config.validate().is_ok());

        config.init_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}

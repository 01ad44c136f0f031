//! Keel HTTP Client
//!
//! A simple, type-safe HTTP client for the Keel platform API.
//!
//! The platform API is the source of truth the other services talk to: it
//! stores triggers and saved workflows, executes remote actions fired by the
//! scheduler, answers cluster state queries and resolves approver groups.
//! The orchestrator serves the workflow endpoints of the same API.
//!
//! # Example
//!
//! ```no_run
//! use keel_client::PlatformClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = PlatformClient::new("http://localhost:8080");
//!
//!     let triggers = client.list_enabled_triggers().await?;
//!     println!("{} enabled trigger(s)", triggers.len());
//!     Ok(())
//! }
//! ```

pub mod error;
mod cluster;
mod retry;
mod triggers;
mod workflows;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use retry::RetryPolicy;

use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;

/// HTTP client for the Keel platform API
///
/// This client provides methods for all platform endpoints, organized
/// into logical groups:
/// - Trigger listing and disabling (scheduler)
/// - Remote action invocation (scheduler)
/// - Saved workflows, linting and task creation (orchestrator, CLI)
/// - Cluster state and approver groups (orchestrator)
#[derive(Debug, Clone)]
pub struct PlatformClient {
    /// Base URL of the platform (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
    /// Retry policy applied to every outbound call
    retry: RetryPolicy,
}

impl PlatformClient {
    /// Create a new platform client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the platform API (e.g., "http://localhost:8080")
    ///
    /// # Example
    /// ```
    /// use keel_client::PlatformClient;
    ///
    /// let client = PlatformClient::new("http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new platform client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the platform API
    /// * `client` - A configured reqwest Client
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy
    ///
    /// # Example
    /// ```
    /// use keel_client::{PlatformClient, RetryPolicy};
    /// use std::time::Duration;
    ///
    /// let client = PlatformClient::new("http://localhost:8080")
    ///     .with_retry(RetryPolicy::new(100, Duration::from_secs(3)));
    /// assert_eq!(client.retry_policy().max_retries, 100);
    /// ```
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Get the base URL of the platform
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Build the full URL of an API path
    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Build the full URL of an API path given as raw segments
    ///
    /// Each segment is percent-encoded, so names may carry `/`, `?` or `#`.
    fn segment_url<S: AsRef<str>>(&self, segments: &[S]) -> Result<Url> {
        let mut url =
            Url::parse(&self.url("")).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(format!("{} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // =============================================================================
    // Transport
    // =============================================================================

    /// Send a request, retrying transport failures and 5xx responses
    ///
    /// The request is rebuilt for every attempt. Between attempts the client
    /// waits the policy's fixed interval. A POST may already have been applied
    /// when the platform answers 5xx or times out, so it is only retried when
    /// the connection was never made.
    async fn send(&self, build: impl Fn() -> RequestBuilder) -> Result<reqwest::Response> {
        let mut attempt = 0;

        loop {
            let request = build().build()?;
            let method = request.method().clone();
            let outcome = self.client.execute(request).await;

            let retryable = match &outcome {
                Ok(response) => retryable_status(&method, response.status()),
                Err(e) => {
                    e.is_connect() || (method != Method::POST && (e.is_timeout() || e.is_request()))
                }
            };

            if !retryable || attempt >= self.retry.max_retries {
                return outcome.map_err(ClientError::from);
            }

            attempt += 1;
            match &outcome {
                Ok(response) => tracing::warn!(
                    "Platform returned {} (attempt {}/{}), retrying in {:?}",
                    response.status(),
                    attempt,
                    self.retry.max_retries,
                    self.retry.wait
                ),
                Err(e) => tracing::warn!(
                    "Platform request failed (attempt {}/{}): {}, retrying in {:?}",
                    attempt,
                    self.retry.max_retries,
                    e,
                    self.retry.wait
                ),
            }

            tokio::time::sleep(self.retry.wait).await;
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response where 404 means "absent" rather than an error
    async fn handle_optional_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<Option<T>> {
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        self.handle_response(response).await.map(Some)
    }

    /// Handle an API response that returns no content
    ///
    /// This method checks the status code and returns an error if the request failed.
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}

/// Whether a response status warrants another attempt of the same request
fn retryable_status(method: &Method, status: StatusCode) -> bool {
    status.is_server_error() && *method != Method::POST
}

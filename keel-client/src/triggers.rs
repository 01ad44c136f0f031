//! Trigger-related API endpoints

use crate::PlatformClient;
use crate::error::Result;
use keel_core::domain::trigger::{Trigger, TriggerKind};
use keel_core::dto::cronjob::DisableTriggers;

impl PlatformClient {
    // =============================================================================
    // Trigger Listing
    // =============================================================================

    /// List every enabled trigger
    ///
    /// Used by the scheduler on start to rebuild its registrations.
    ///
    /// # Example
    /// ```no_run
    /// # use keel_client::PlatformClient;
    /// # async fn example() -> anyhow::Result<()> {
    /// let client = PlatformClient::new("http://localhost:8080");
    /// for trigger in client.list_enabled_triggers().await? {
    ///     println!("{} ({})", trigger.name, trigger.kind());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn list_enabled_triggers(&self) -> Result<Vec<Trigger>> {
        let url = self.url("cron/cronjob");
        let response = self.send(|| self.client.get(&url)).await?;

        self.handle_response(response).await
    }

    /// List triggers that should be active but may have been missed
    pub async fn list_failsafe_triggers(&self) -> Result<Vec<Trigger>> {
        let url = self.url("cron/cronjob/failsafe");
        let response = self.send(|| self.client.get(&url)).await?;

        self.handle_response(response).await
    }

    /// List the triggers owned by one entity
    ///
    /// # Arguments
    /// * `kind` - The owning entity's trigger kind
    /// * `name` - The owning entity's name
    pub async fn list_triggers(&self, kind: TriggerKind, name: &str) -> Result<Vec<Trigger>> {
        let url = self.url(&format!("cron/cronjob/type/{}/name/{}", kind, name));
        let response = self.send(|| self.client.get(&url)).await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Trigger Updates
    // =============================================================================

    /// Mark every trigger of an entity as disabled on the platform
    pub async fn disable_trigger(&self, name: &str, kind: TriggerKind) -> Result<()> {
        let url = self.url("cron/cronjob/disable");
        let body = DisableTriggers {
            name: name.to_string(),
            kind,
        };
        let response = self.send(|| self.client.post(&url).json(&body)).await?;

        self.handle_empty_response(response).await
    }

    // =============================================================================
    // Remote Actions
    // =============================================================================

    /// Invoke the remote action behind a fired trigger
    ///
    /// # Arguments
    /// * `segments` - API path segments, encoded individually
    /// * `query` - Query parameters
    /// * `payload` - Optional JSON body
    pub async fn invoke_remote_action<S: AsRef<str>>(
        &self,
        segments: &[S],
        query: &[(&str, String)],
        payload: Option<&serde_json::Value>,
    ) -> Result<()> {
        let url = self.segment_url(segments)?;
        let response = self
            .send(|| {
                let request = self.client.post(url.clone()).query(query);
                match payload {
                    Some(body) => request.json(body),
                    None => request,
                }
            })
            .await?;

        self.handle_empty_response(response).await
    }
}

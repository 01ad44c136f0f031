//! Workflow-related API endpoints

use crate::PlatformClient;
use crate::error::Result;
use keel_core::domain::task::WorkflowTask;
use keel_core::domain::workflow::Workflow;
use keel_core::dto::workflow::{CreateTask, LintReport};

impl PlatformClient {
    // =============================================================================
    // Saved Workflows
    // =============================================================================

    /// Get the latest saved definition of a workflow
    ///
    /// # Returns
    /// `None` if no workflow with that name was saved
    ///
    /// # Example
    /// ```no_run
    /// # use keel_client::PlatformClient;
    /// # async fn example() -> anyhow::Result<()> {
    /// let client = PlatformClient::new("http://localhost:8080");
    /// if let Some(workflow) = client.find_saved_workflow("release").await? {
    ///     println!("{} stage(s)", workflow.stages.len());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn find_saved_workflow(&self, name: &str) -> Result<Option<Workflow>> {
        let url = self.url(&format!("workflow/{}", name));
        let response = self.send(|| self.client.get(&url)).await?;

        self.handle_optional_response(response).await
    }

    /// Lint and persist a workflow definition
    pub async fn save_workflow(&self, workflow: &Workflow) -> Result<Workflow> {
        let url = self.url("workflow");
        let response = self.send(|| self.client.put(&url).json(workflow)).await?;

        self.handle_response(response).await
    }

    /// Lint a workflow definition without saving it
    pub async fn lint_workflow(&self, workflow: &Workflow) -> Result<LintReport> {
        let url = self.url("workflow/lint");
        let response = self.send(|| self.client.post(&url).json(workflow)).await?;

        self.handle_response(response).await
    }

    /// Apply presets and selectable options to a workflow definition
    ///
    /// # Arguments
    /// * `workflow` - The definition to prepare
    /// * `reset_selection` - Also drop the current selections
    pub async fn preset_workflow(
        &self,
        workflow: &Workflow,
        reset_selection: bool,
    ) -> Result<Workflow> {
        let url = self.url("workflow/preset");
        let response = self
            .send(|| {
                self.client
                    .post(&url)
                    .query(&[("reset_selection", reset_selection)])
                    .json(workflow)
            })
            .await?;

        self.handle_response(response).await
    }

    /// Reconcile an edited definition with the latest saved one
    pub async fn refresh_workflow(&self, workflow: &Workflow) -> Result<Workflow> {
        let url = self.url("workflow/latest");
        let response = self.send(|| self.client.post(&url).json(workflow)).await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Tasks
    // =============================================================================

    /// Compile a saved workflow into a run
    ///
    /// # Arguments
    /// * `name` - Saved workflow name
    /// * `req` - Task ID and optional per-run overrides
    pub async fn create_task(&self, name: &str, req: &CreateTask) -> Result<WorkflowTask> {
        let url = self.url(&format!("workflow/{}/task", name));
        let response = self.send(|| self.client.post(&url).json(req)).await?;

        self.handle_response(response).await
    }
}

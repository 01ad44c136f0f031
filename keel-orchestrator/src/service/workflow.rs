//! Workflow Service
//!
//! Drives the job variant lifecycle over whole workflows: linting, display
//! preparation, reconciliation with the latest saved definition, per-run
//! overrides and compilation into a task graph.

use keel_core::domain::task::{StageTask, WorkflowTask};
use keel_core::domain::workflow::{JobKind, Workflow};
use thiserror::Error;

use crate::collaborator::Collaborators;
use crate::error::JobError;
use crate::job::{JobContext, JobVariant, new_job_variant};

/// Service error type
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Job(#[from] JobError),
}

pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Lifecycle steps that reshape jobs in place
#[derive(Debug, Clone, Copy)]
enum Step {
    Preset,
    Options,
    ClearOptions,
    ClearSelection,
    LatestSetting,
}

pub struct WorkflowCompiler {
    collaborators: Collaborators,
}

impl WorkflowCompiler {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    fn context<'a>(&'a self, workflow: &'a Workflow) -> JobContext<'a> {
        JobContext::new(workflow, &self.collaborators)
    }

    /// Build and instantiate the variant of the job at `position`
    fn variant_at(
        workflow: &Workflow,
        (stage, index): (usize, usize),
    ) -> std::result::Result<Box<dyn JobVariant>, JobError> {
        let mut variant = new_job_variant(workflow.stages[stage].jobs[index].clone())?;
        variant.instantiate()?;
        Ok(variant)
    }

    // =============================================================================
    // Lint
    // =============================================================================

    /// Validate a workflow and every job in it
    pub async fn lint_workflow(&self, workflow: &Workflow) -> std::result::Result<(), JobError> {
        if workflow.name.trim().is_empty() {
            return Err(JobError::Lint("workflow name cannot be empty".to_string()));
        }

        let duplicates = workflow.duplicate_job_names();
        if !duplicates.is_empty() {
            return Err(JobError::Lint(format!(
                "duplicate job name(s): {}",
                duplicates.join(", ")
            )));
        }

        for position in job_positions(workflow) {
            let variant = Self::variant_at(workflow, position)?;
            variant.lint_job(&self.context(workflow)).await?;
        }

        Ok(())
    }

    // =============================================================================
    // In-place Lifecycle Steps
    // =============================================================================

    async fn apply(&self, workflow: &mut Workflow, step: Step) -> std::result::Result<(), JobError> {
        for position in job_positions(workflow) {
            let (stage, index) = position;
            // Kinds without a variant pass through untouched
            if workflow.stages[stage].jobs[index].kind == JobKind::Other {
                continue;
            }

            let mut variant = Self::variant_at(workflow, position)?;
            let ctx = self.context(workflow);
            match step {
                Step::Preset => variant.set_preset(&ctx).await?,
                Step::Options => variant.set_options(&ctx).await?,
                Step::ClearOptions => variant.clear_options()?,
                Step::ClearSelection => variant.clear_selection_field()?,
                Step::LatestSetting => variant.update_with_latest_setting(&ctx).await?,
            }
            workflow.stages[stage].jobs[index] = variant.into_job();
        }

        Ok(())
    }

    pub async fn set_preset(&self, workflow: &mut Workflow) -> std::result::Result<(), JobError> {
        self.apply(workflow, Step::Preset).await
    }

    pub async fn set_options(&self, workflow: &mut Workflow) -> std::result::Result<(), JobError> {
        self.apply(workflow, Step::Options).await
    }

    pub async fn clear_options(&self, workflow: &mut Workflow) -> std::result::Result<(), JobError> {
        self.apply(workflow, Step::ClearOptions).await
    }

    pub async fn clear_selection_fields(
        &self,
        workflow: &mut Workflow,
    ) -> std::result::Result<(), JobError> {
        self.apply(workflow, Step::ClearSelection).await
    }

    /// Reconcile every job against the latest saved definition
    pub async fn update_with_latest_settings(
        &self,
        workflow: &mut Workflow,
    ) -> std::result::Result<(), JobError> {
        self.apply(workflow, Step::LatestSetting).await
    }

    /// Apply per-run overrides, matched to jobs by name
    pub fn merge_args(
        &self,
        workflow: &mut Workflow,
        args: &Workflow,
    ) -> std::result::Result<(), JobError> {
        for position in job_positions(workflow) {
            let (stage, index) = position;
            let job = &workflow.stages[stage].jobs[index];
            if job.kind == JobKind::Other {
                continue;
            }
            let Some(arg_job) = args.jobs().find(|arg| arg.name == job.name) else {
                continue;
            };

            let mut variant = Self::variant_at(workflow, position)?;
            variant.merge_args(arg_job)?;
            workflow.stages[stage].jobs[index] = variant.into_job();
        }

        Ok(())
    }

    // =============================================================================
    // Compilation
    // =============================================================================

    /// Compile a workflow into its task graph
    ///
    /// Jobs compile one at a time in stage order. Each compiled job is
    /// written back before the next one runs, so chained jobs see what their
    /// origin recorded (gray-release replica counts).
    pub async fn compile(
        &self,
        workflow: &mut Workflow,
        task_id: i64,
    ) -> std::result::Result<WorkflowTask, JobError> {
        let mut stages = Vec::with_capacity(workflow.stages.len());

        for stage in 0..workflow.stages.len() {
            let mut tasks = Vec::new();

            for index in 0..workflow.stages[stage].jobs.len() {
                let mut variant = Self::variant_at(workflow, (stage, index))?;
                let compiled = variant
                    .to_jobs(&self.context(workflow), task_id)
                    .await?;
                tracing::debug!(
                    "Compiled job {} into {} task(s)",
                    variant.name(),
                    compiled.len()
                );
                workflow.stages[stage].jobs[index] = variant.into_job();
                tasks.extend(compiled);
            }

            stages.push(StageTask {
                name: workflow.stages[stage].name.clone(),
                parallel: workflow.stages[stage].parallel,
                tasks,
            });
        }

        Ok(WorkflowTask {
            workflow_name: workflow.name.clone(),
            task_id,
            stages,
        })
    }

    // =============================================================================
    // Saved Workflows
    // =============================================================================

    /// Get the latest saved definition of a workflow
    pub async fn find_workflow(&self, name: &str) -> Result<Workflow> {
        self.collaborators
            .store
            .find_saved_workflow(name)
            .await
            .map_err(|e| JobError::Store(format!("{:#}", e)))?
            .ok_or_else(|| WorkflowError::NotFound(name.to_string()))
    }

    /// Lint a workflow, then persist it
    pub async fn save_workflow(&self, workflow: &Workflow) -> Result<()> {
        self.lint_workflow(workflow).await?;

        self.collaborators
            .store
            .save_workflow(workflow)
            .await
            .map_err(|e| JobError::Store(format!("{:#}", e)))?;

        tracing::info!("Workflow saved: {}", workflow.name);
        Ok(())
    }

    /// Prepare a workflow for display
    ///
    /// Options are only offered once the workflow has been saved.
    pub async fn prepare_workflow(&self, workflow: &mut Workflow, reset_selection: bool) -> Result<()> {
        self.set_preset(workflow).await?;

        let saved = self
            .collaborators
            .store
            .find_saved_workflow(&workflow.name)
            .await
            .map_err(|e| JobError::Store(format!("{:#}", e)))?;
        if saved.is_some() {
            self.set_options(workflow).await?;
        } else {
            self.clear_options(workflow).await?;
        }

        if reset_selection {
            self.clear_selection_fields(workflow).await?;
        }

        Ok(())
    }

    /// Compile the saved workflow `name` into a run
    ///
    /// `args` carries per-run overrides matched to saved jobs by name.
    pub async fn create_task(
        &self,
        name: &str,
        args: Option<&Workflow>,
        task_id: i64,
    ) -> Result<WorkflowTask> {
        let mut workflow = self.find_workflow(name).await?;

        if let Some(args) = args {
            self.merge_args(&mut workflow, args)?;
        }

        self.lint_workflow(&workflow).await?;
        let task = self.compile(&mut workflow, task_id).await?;

        tracing::info!(
            "Created task {} for workflow {} ({} stage(s))",
            task_id,
            name,
            task.stages.len()
        );
        Ok(task)
    }
}

/// Positions of every job, in stage order
fn job_positions(workflow: &Workflow) -> Vec<(usize, usize)> {
    workflow
        .stages
        .iter()
        .enumerate()
        .flat_map(|(stage, s)| (0..s.jobs.len()).map(move |index| (stage, index)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::testing::*;
    use keel_core::domain::task::TaskSpec;
    use keel_core::domain::workflow::Job;
    use serde_json::json;

    fn target(name: &str) -> serde_json::Value {
        json!({
            "workload_type": "Deployment",
            "workload_name": name,
            "container_name": name,
            "image": format!("registry/{}:v2", name),
        })
    }

    fn gray(name: &str, from_job: &str, gray_scale: u32, targets: Vec<serde_json::Value>) -> Job {
        job(
            name,
            JobKind::GrayRelease,
            json!({
                "cluster_id": "c1",
                "namespace": "prod",
                "from_job": from_job,
                "gray_scale": gray_scale,
                "targets": targets,
            }),
        )
    }

    fn gate(name: &str) -> Job {
        job(
            name,
            JobKind::Approval,
            json!({
                "type": "native",
                "native_approval": {
                    "approve_users": [{ "type": "user", "user_id": "u1" }],
                    "needed_approvers": 1,
                },
            }),
        )
    }

    fn release_workflow() -> Workflow {
        workflow(
            "release",
            vec![
                stage("canary", true, vec![gray("canary", "", 30, vec![target("api")])]),
                stage("gate", true, vec![gate("approve")]),
                stage("full", true, vec![gray("full", "canary", 100, vec![])]),
            ],
        )
    }

    fn fixture() -> Fixture {
        let mut fixture = Fixture::default();
        fixture.cluster.deployments.insert("prod/api".to_string(), 10);
        fixture
            .cluster
            .clusters
            .insert("c1".to_string(), "production".to_string());
        fixture
    }

    #[tokio::test]
    async fn test_compile_chains_replicas_through_write_back() {
        let compiler = WorkflowCompiler::new(fixture().collaborators());
        let mut current = release_workflow();

        let task = compiler.compile(&mut current, 42).await.unwrap();

        assert_eq!(task.task_id, 42);
        assert_eq!(task.stages.len(), 3);
        let TaskSpec::GrayRelease(canary) = &task.stages[0].tasks[0].spec else {
            panic!("expected gray release task");
        };
        assert_eq!((canary.total_replica, canary.gray_replica), (10, 3));

        // The full release only knows the replica count the canary recorded
        let TaskSpec::GrayRelease(full) = &task.stages[2].tasks[0].spec else {
            panic!("expected gray release task");
        };
        assert_eq!((full.total_replica, full.gray_replica), (10, 10));
        assert_eq!(current.stages[0].jobs[0].spec["targets"][0]["replica"], 10);
    }

    #[tokio::test]
    async fn test_compile_aborts_on_first_failing_job() {
        let compiler = WorkflowCompiler::new(Fixture::default().collaborators());
        let mut current = release_workflow();

        let err = compiler.compile(&mut current, 1).await.unwrap_err();
        assert!(matches!(err, JobError::ClusterLookup(_)));
    }

    #[tokio::test]
    async fn test_lint_rejects_duplicate_names() {
        let compiler = WorkflowCompiler::new(fixture().collaborators());
        let current = workflow(
            "release",
            vec![
                stage("one", true, vec![gate("approve")]),
                stage("two", true, vec![gate("approve")]),
            ],
        );

        let err = compiler.lint_workflow(&current).await.unwrap_err();
        assert!(matches!(err, JobError::Lint(msg) if msg.contains("approve")));
    }

    #[tokio::test]
    async fn test_lint_rejects_unknown_kinds() {
        let compiler = WorkflowCompiler::new(fixture().collaborators());
        let current = workflow(
            "release",
            vec![stage("build", true, vec![job("build", JobKind::Other, json!({}))])],
        );

        let err = compiler.lint_workflow(&current).await.unwrap_err();
        assert!(matches!(err, JobError::UnsupportedKind(JobKind::Other)));
    }

    #[tokio::test]
    async fn test_save_lints_before_persisting() {
        let fixture = fixture();
        let store = fixture.store.clone();
        let compiler = WorkflowCompiler::new(fixture.collaborators());

        let broken = workflow(
            "broken",
            vec![stage("canary", true, vec![gray("canary", "", 30, vec![])])],
        );
        assert!(compiler.save_workflow(&broken).await.is_err());
        assert!(store.workflows.lock().unwrap().is_empty());

        compiler.save_workflow(&release_workflow()).await.unwrap();
        assert!(store.workflows.lock().unwrap().contains_key("release"));
    }

    #[tokio::test]
    async fn test_create_task_merges_overrides() {
        let mut fixture = fixture();
        fixture.cluster.deployments.insert("prod/web".to_string(), 4);
        fixture.save(&release_workflow());
        let compiler = WorkflowCompiler::new(fixture.collaborators());

        let args = workflow(
            "release",
            vec![stage("canary", true, vec![gray("canary", "", 0, vec![target("web")])])],
        );
        let task = compiler.create_task("release", Some(&args), 9).await.unwrap();

        let TaskSpec::GrayRelease(canary) = &task.stages[0].tasks[0].spec else {
            panic!("expected gray release task");
        };
        assert_eq!(canary.workload_name, "web");
        // Only targets are overridden
        assert_eq!(canary.gray_scale, 30);
    }

    #[tokio::test]
    async fn test_create_task_requires_saved_workflow() {
        let compiler = WorkflowCompiler::new(fixture().collaborators());
        let err = compiler.create_task("missing", None, 1).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(name) if name == "missing"));
    }

    #[tokio::test]
    async fn test_prepare_offers_options_for_saved_workflows() {
        let fixture = fixture();
        fixture.save(&release_workflow());
        let compiler = WorkflowCompiler::new(fixture.collaborators());

        let mut current = release_workflow();
        compiler.prepare_workflow(&mut current, false).await.unwrap();
        assert_eq!(
            current.stages[0].jobs[0].spec["target_options"][0]["workload_name"],
            "api"
        );

        compiler.prepare_workflow(&mut current, true).await.unwrap();
        assert_eq!(current.stages[0].jobs[0].spec["targets"], json!([]));

        let mut unsaved = release_workflow();
        unsaved.name = "draft".to_string();
        compiler.prepare_workflow(&mut unsaved, false).await.unwrap();
        assert!(unsaved.stages[0].jobs[0].spec.get("target_options").is_none());
    }

    #[tokio::test]
    async fn test_update_with_latest_settings_reaches_every_job() {
        let fixture = fixture();
        let mut saved = release_workflow();
        saved.stages[1].jobs[0].spec["description"] = json!("sign off");
        fixture.save(&saved);
        let compiler = WorkflowCompiler::new(fixture.collaborators());

        let mut current = release_workflow();
        compiler
            .update_with_latest_settings(&mut current)
            .await
            .unwrap();

        assert_eq!(current.stages[1].jobs[0].spec["description"], "sign off");
    }

    #[test]
    fn test_job_positions_follow_stage_order() {
        let positions = job_positions(&release_workflow());
        assert_eq!(positions, vec![(0, 0), (1, 0), (2, 0)]);
    }
}

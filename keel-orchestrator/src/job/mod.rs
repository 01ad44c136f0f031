//! Job variants
//!
//! Every job kind implements [`JobVariant`]. The workflow compiler drives the
//! lifecycle; a variant only ever sees its own job plus a read-only view of
//! the workflow it belongs to.

pub mod approval;
pub mod gray_release;

use async_trait::async_trait;
use keel_core::domain::task::CompiledTask;
use keel_core::domain::workflow::{Job, JobKind, Workflow};

use crate::collaborator::Collaborators;
use crate::error::{JobError, Result};

pub use approval::ApprovalJob;
pub use gray_release::GrayReleaseJob;

/// What a variant can see while running a lifecycle step
pub struct JobContext<'a> {
    /// Workflow the job belongs to, as currently held by the caller
    pub workflow: &'a Workflow,
    pub collaborators: &'a Collaborators,
}

impl<'a> JobContext<'a> {
    pub fn new(workflow: &'a Workflow, collaborators: &'a Collaborators) -> Self {
        Self {
            workflow,
            collaborators,
        }
    }

    /// Find this job's counterpart in the latest saved workflow
    pub async fn latest_saved_job(&self, name: &str, kind: JobKind) -> Result<Job> {
        let saved = self
            .collaborators
            .store
            .find_saved_workflow(&self.workflow.name)
            .await
            .map_err(|e| JobError::Store(format!("{:#}", e)))?
            .ok_or_else(|| {
                JobError::OriginNotFound(format!("workflow {} is not saved", self.workflow.name))
            })?;

        saved.find_job(name, kind).cloned().ok_or_else(|| {
            JobError::OriginNotFound(format!(
                "job {} not found in saved workflow {}",
                name, self.workflow.name
            ))
        })
    }
}

/// Lifecycle shared by all job kinds
#[async_trait]
pub trait JobVariant: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> JobKind;

    /// Decode the stored spec into the typed spec
    fn instantiate(&mut self) -> Result<()>;

    /// Fill derived fields before the job is shown to a user
    async fn set_preset(&mut self, ctx: &JobContext<'_>) -> Result<()>;

    /// Populate the selectable choices
    async fn set_options(&mut self, ctx: &JobContext<'_>) -> Result<()>;

    fn clear_options(&mut self) -> Result<()>;

    /// Drop the user's current selections
    fn clear_selection_field(&mut self) -> Result<()>;

    /// Apply per-run overrides from a job with the same identity
    fn merge_args(&mut self, args: &Job) -> Result<()>;

    /// Reconcile against the latest saved definition of this job
    async fn update_with_latest_setting(&mut self, ctx: &JobContext<'_>) -> Result<()>;

    /// Compile into executable tasks
    async fn to_jobs(&mut self, ctx: &JobContext<'_>, task_id: i64) -> Result<Vec<CompiledTask>>;

    async fn lint_job(&self, ctx: &JobContext<'_>) -> Result<()>;

    /// Re-encode the typed spec into the stored job
    fn into_job(self: Box<Self>) -> Job;
}

/// Build the variant for a job kind
pub fn new_job_variant(job: Job) -> Result<Box<dyn JobVariant>> {
    match job.kind {
        JobKind::Approval => Ok(Box::new(ApprovalJob::new(job))),
        JobKind::GrayRelease => Ok(Box::new(GrayReleaseJob::new(job))),
        kind => Err(JobError::UnsupportedKind(kind)),
    }
}

/// True when an override job addresses the same job
fn same_identity(job: &Job, args: &Job) -> bool {
    job.name == args.name && job.kind == args.kind
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fakes for the collaborator traits

    use super::*;
    use crate::collaborator::{ClusterClient, Feature, LicenseChecker, UserDirectory, WorkflowStore};
    use keel_core::domain::workflow::{ErrorPolicy, Stage};
    use keel_core::dto::cluster::GroupMember;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    pub struct FakeStore {
        pub workflows: Mutex<HashMap<String, Workflow>>,
    }

    #[async_trait]
    impl WorkflowStore for FakeStore {
        async fn find_saved_workflow(&self, name: &str) -> anyhow::Result<Option<Workflow>> {
            Ok(self.workflows.lock().unwrap().get(name).cloned())
        }

        async fn save_workflow(&self, workflow: &Workflow) -> anyhow::Result<()> {
            self.workflows
                .lock()
                .unwrap()
                .insert(workflow.name.clone(), workflow.clone());
            Ok(())
        }
    }

    /// Deployments keyed by `namespace/name`
    #[derive(Default)]
    pub struct FakeCluster {
        pub deployments: HashMap<String, i32>,
        pub clusters: HashMap<String, String>,
        pub fail: bool,
    }

    #[async_trait]
    impl ClusterClient for FakeCluster {
        async fn deployment_replicas(
            &self,
            _cluster_id: &str,
            namespace: &str,
            name: &str,
        ) -> anyhow::Result<Option<i32>> {
            if self.fail {
                anyhow::bail!("api server unreachable");
            }
            Ok(self
                .deployments
                .get(&format!("{}/{}", namespace, name))
                .copied())
        }

        async fn cluster_name(&self, cluster_id: &str) -> anyhow::Result<Option<String>> {
            Ok(self.clusters.get(cluster_id).cloned())
        }
    }

    pub struct FakeLicense {
        pub licensed: bool,
    }

    impl LicenseChecker for FakeLicense {
        fn check_license(&self, feature: Feature) -> anyhow::Result<()> {
            if self.licensed {
                Ok(())
            } else {
                anyhow::bail!("{} is not licensed", feature)
            }
        }
    }

    #[derive(Default)]
    pub struct FakeDirectory {
        pub groups: HashMap<String, Vec<GroupMember>>,
    }

    #[async_trait]
    impl UserDirectory for FakeDirectory {
        async fn group_members(&self, group_id: &str) -> anyhow::Result<Vec<GroupMember>> {
            Ok(self.groups.get(group_id).cloned().unwrap_or_default())
        }
    }

    pub fn member(user_id: &str, user_name: &str) -> GroupMember {
        GroupMember {
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
        }
    }

    pub struct Fixture {
        pub store: Arc<FakeStore>,
        pub cluster: FakeCluster,
        pub licensed: bool,
        pub directory: FakeDirectory,
    }

    impl Default for Fixture {
        fn default() -> Self {
            Self {
                store: Arc::new(FakeStore::default()),
                cluster: FakeCluster::default(),
                licensed: true,
                directory: FakeDirectory::default(),
            }
        }
    }

    impl Fixture {
        pub fn save(&self, workflow: &Workflow) {
            self.store
                .workflows
                .lock()
                .unwrap()
                .insert(workflow.name.clone(), workflow.clone());
        }

        pub fn collaborators(self) -> Collaborators {
            Collaborators {
                store: self.store,
                cluster: Arc::new(self.cluster),
                license: Arc::new(FakeLicense {
                    licensed: self.licensed,
                }),
                users: Arc::new(self.directory),
            }
        }
    }

    pub fn job(name: &str, kind: JobKind, spec: serde_json::Value) -> Job {
        Job {
            name: name.to_string(),
            kind,
            spec,
            error_policy: ErrorPolicy::default(),
        }
    }

    pub fn stage(name: &str, parallel: bool, jobs: Vec<Job>) -> Stage {
        Stage {
            name: name.to_string(),
            parallel,
            jobs,
        }
    }

    pub fn workflow(name: &str, stages: Vec<Stage>) -> Workflow {
        Workflow {
            name: name.to_string(),
            display_name: None,
            stages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_registry_rejects_unknown_kind() {
        let result = new_job_variant(job("build", JobKind::Other, serde_json::json!({})));
        assert!(matches!(
            result,
            Err(JobError::UnsupportedKind(JobKind::Other))
        ));
    }

    #[test]
    fn test_registry_maps_kinds() {
        let variant = new_job_variant(job("gate", JobKind::Approval, serde_json::json!({})))
            .unwrap();
        assert_eq!(variant.kind(), JobKind::Approval);
        assert_eq!(variant.name(), "gate");

        let variant = new_job_variant(job("canary", JobKind::GrayRelease, serde_json::json!({})))
            .unwrap();
        assert_eq!(variant.kind(), JobKind::GrayRelease);
    }

    #[tokio::test]
    async fn test_latest_saved_job_requires_saved_workflow() {
        let fixture = Fixture::default();
        let collaborators = fixture.collaborators();
        let current = workflow("release", vec![]);
        let ctx = JobContext::new(&current, &collaborators);

        let err = ctx
            .latest_saved_job("gate", JobKind::Approval)
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::OriginNotFound(_)));
    }
}

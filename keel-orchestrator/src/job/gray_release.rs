//! Gray-release (canary) deploy job
//!
//! Gray-release jobs form chains. The first job of a chain deploys a canary
//! copy of each target at a partial percentage and records the live replica
//! counts; every chained job names the first job, inherits its target set and
//! ramps the percentage up, the last one to a full release.

use async_trait::async_trait;
use keel_core::codec::{decode_as, encode};
use keel_core::domain::gray_release::{GRAY_WORKLOAD_SUFFIX, GrayReleaseSpec};
use keel_core::domain::task::{
    CompiledTask, GrayReleaseTaskSpec, JOB_NAME_KEY, TaskSpec, task_display_name, task_key,
    task_name,
};
use keel_core::domain::workflow::{Job, JobKind, Workflow};
use std::collections::BTreeMap;

use super::{JobContext, JobVariant, same_identity};
use crate::collaborator::Feature;
use crate::error::{JobError, Result};

const FULL_RELEASE: u32 = 100;

pub struct GrayReleaseJob {
    job: Job,
    spec: GrayReleaseSpec,
}

impl GrayReleaseJob {
    pub fn new(job: Job) -> Self {
        Self {
            job,
            spec: GrayReleaseSpec::default(),
        }
    }

    fn find_first_job(&self, workflow: &Workflow) -> Result<GrayReleaseSpec> {
        let origin = workflow
            .find_job(&self.spec.from_job, JobKind::GrayRelease)
            .ok_or_else(|| {
                JobError::OriginNotFound(format!(
                    "gray release job {} referenced by {} not found",
                    self.spec.from_job, self.job.name
                ))
            })?;
        Ok(decode_as(JobKind::GrayRelease, &origin.spec)?)
    }

    /// Check the chain started by this job
    ///
    /// Chained jobs are walked in execution-rank order. Each must run after
    /// this job, only the last one may release in full and it must.
    fn lint_first_job(&self, workflow: &Workflow) -> Result<()> {
        let ranks = workflow.job_ranks();
        let own_rank = ranks.get(&self.job.name).copied().unwrap_or_default();

        let mut chained = Vec::new();
        for job in workflow.jobs().filter(|job| job.kind == JobKind::GrayRelease) {
            let spec: GrayReleaseSpec = decode_as(JobKind::GrayRelease, &job.spec)?;
            if spec.from_job == self.job.name {
                let rank = ranks.get(&job.name).copied().unwrap_or_default();
                chained.push((job.name.as_str(), spec.gray_scale, rank));
            }
        }
        chained.sort_by_key(|(_, _, rank)| *rank);

        if chained.is_empty() {
            return Err(JobError::Lint(format!(
                "no release job found for {}",
                self.job.name
            )));
        }

        let last = chained.len() - 1;
        for (index, (name, gray_scale, rank)) in chained.into_iter().enumerate() {
            if own_rank >= rank {
                return Err(JobError::Lint(format!(
                    "release job {} must run before {}",
                    self.job.name, name
                )));
            }
            if index < last && gray_scale >= FULL_RELEASE {
                return Err(JobError::Lint(format!(
                    "release job {} cannot fully release in the middle of the chain",
                    name
                )));
            }
            if index == last && gray_scale != FULL_RELEASE {
                return Err(JobError::Lint(format!(
                    "last release job {} must release in full",
                    name
                )));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl JobVariant for GrayReleaseJob {
    fn name(&self) -> &str {
        &self.job.name
    }

    fn kind(&self) -> JobKind {
        JobKind::GrayRelease
    }

    fn instantiate(&mut self) -> Result<()> {
        self.spec = decode_as(JobKind::GrayRelease, &self.job.spec)?;
        Ok(())
    }

    async fn set_preset(&mut self, _ctx: &JobContext<'_>) -> Result<()> {
        Ok(())
    }

    async fn set_options(&mut self, ctx: &JobContext<'_>) -> Result<()> {
        let latest = ctx
            .latest_saved_job(&self.job.name, JobKind::GrayRelease)
            .await?;
        let latest: GrayReleaseSpec = decode_as(JobKind::GrayRelease, &latest.spec)?;
        self.spec.target_options = Some(latest.targets);
        Ok(())
    }

    fn clear_options(&mut self) -> Result<()> {
        self.spec.target_options = None;
        Ok(())
    }

    fn clear_selection_field(&mut self) -> Result<()> {
        self.spec.targets.clear();
        Ok(())
    }

    fn merge_args(&mut self, args: &Job) -> Result<()> {
        if same_identity(&self.job, args) {
            let args: GrayReleaseSpec = decode_as(JobKind::GrayRelease, &args.spec)?;
            self.spec.targets = args.targets;
        }
        Ok(())
    }

    async fn update_with_latest_setting(&mut self, ctx: &JobContext<'_>) -> Result<()> {
        let latest = ctx
            .latest_saved_job(&self.job.name, JobKind::GrayRelease)
            .await?;
        let latest: GrayReleaseSpec = decode_as(JobKind::GrayRelease, &latest.spec)?;

        self.spec.docker_registry_id = latest.docker_registry_id;

        if self.spec.cluster_id != latest.cluster_id {
            self.spec.cluster_id = latest.cluster_id;
            self.spec.namespace = String::new();
            self.spec.gray_scale = 0;
            self.spec.from_job = String::new();
            self.spec.deploy_timeout = 0;
            self.spec.targets.clear();
        } else if self.spec.namespace != latest.namespace {
            self.spec.namespace = latest.namespace;
            self.spec.from_job = latest.from_job;
            self.spec.targets.clear();
            self.spec.deploy_timeout = 0;
            self.spec.gray_scale = 0;
        } else {
            self.spec.from_job = latest.from_job;
        }

        // Only selections still offered survive, in the offered order
        let selected = std::mem::take(&mut self.spec.targets);
        self.spec.targets = latest
            .targets
            .iter()
            .filter_map(|offered| {
                selected
                    .iter()
                    .find(|target| target.identity() == offered.identity())
                    .cloned()
            })
            .collect();

        Ok(())
    }

    async fn to_jobs(&mut self, ctx: &JobContext<'_>, _task_id: i64) -> Result<Vec<CompiledTask>> {
        let first_job = self.spec.is_first_job();
        let cluster = ctx.collaborators.cluster.as_ref();

        if first_job {
            if self.spec.gray_scale >= FULL_RELEASE {
                return Err(JobError::Compile(format!(
                    "first release job {} cannot release in full",
                    self.job.name
                )));
            }

            for target in self.spec.targets.iter_mut() {
                let replicas = cluster
                    .deployment_replicas(
                        &self.spec.cluster_id,
                        &self.spec.namespace,
                        &target.workload_name,
                    )
                    .await
                    .map_err(|e| JobError::ClusterLookup(format!("{:#}", e)))?
                    .ok_or_else(|| {
                        JobError::ClusterLookup(format!(
                            "deployment {} not found in namespace {}",
                            target.workload_name, self.spec.namespace
                        ))
                    })?;
                target.replica = replicas;
            }
        } else {
            if self.spec.gray_scale > FULL_RELEASE {
                return Err(JobError::Compile(format!(
                    "release job {} percentage cannot exceed {}",
                    self.job.name, FULL_RELEASE
                )));
            }

            let origin = self.find_first_job(ctx.workflow)?;
            self.spec.cluster_id = origin.cluster_id;
            self.spec.namespace = origin.namespace;
            self.spec.docker_registry_id = origin.docker_registry_id;
            self.spec.targets = origin.targets;
        }

        let cluster_name = cluster
            .cluster_name(&self.spec.cluster_id)
            .await
            .map_err(|e| JobError::ClusterLookup(format!("{:#}", e)))?
            .ok_or_else(|| {
                JobError::ClusterLookup(format!("cluster {} not found", self.spec.cluster_id))
            })?;

        let tasks = self
            .spec
            .targets
            .iter()
            .map(|target| CompiledTask {
                name: task_name(&ctx.workflow.name, &self.job.name, 0),
                key: task_key(&self.job.name, &target.workload_name),
                display_name: task_display_name(&self.job.name, &target.workload_name),
                origin_name: self.job.name.clone(),
                kind: JobKind::GrayRelease,
                job_info: BTreeMap::from([
                    (JOB_NAME_KEY.to_string(), self.job.name.clone()),
                    ("workload_name".to_string(), target.workload_name.clone()),
                ]),
                spec: TaskSpec::GrayRelease(GrayReleaseTaskSpec {
                    cluster_id: self.spec.cluster_id.clone(),
                    cluster_name: cluster_name.clone(),
                    namespace: self.spec.namespace.clone(),
                    workload_type: target.workload_type.clone(),
                    workload_name: target.workload_name.clone(),
                    container_name: target.container_name.clone(),
                    first_job,
                    gray_workload_name: format!("{}{}", target.workload_name, GRAY_WORKLOAD_SUFFIX),
                    image: target.image.clone(),
                    deploy_timeout: self.spec.deploy_timeout,
                    gray_scale: self.spec.gray_scale,
                    total_replica: target.replica,
                    gray_replica: target.gray_replica(self.spec.gray_scale),
                }),
                timeout: self.spec.deploy_timeout,
                error_policy: self.job.error_policy.clone(),
            })
            .collect();

        Ok(tasks)
    }

    async fn lint_job(&self, ctx: &JobContext<'_>) -> Result<()> {
        ctx.collaborators
            .license
            .check_license(Feature::GrayRelease)
            .map_err(|e| JobError::License(format!("{}: {:#}", self.job.name, e)))?;

        if self.spec.gray_scale > FULL_RELEASE {
            return Err(JobError::Lint(format!(
                "release job {} percentage cannot exceed {}",
                self.job.name, FULL_RELEASE
            )));
        }

        if self.spec.is_first_job() {
            return self.lint_first_job(ctx.workflow);
        }

        let origin = self.find_first_job(ctx.workflow)?;
        if !origin.is_first_job() {
            return Err(JobError::ReferenceMismatch(format!(
                "{} cannot reference {}, which is not the first release job",
                self.job.name, self.spec.from_job
            )));
        }

        Ok(())
    }

    fn into_job(self: Box<Self>) -> Job {
        let mut job = self.job;
        job.spec = encode(&self.spec);
        job
    }
}

//! Compiled task types
//!
//! A compiled task is the unit the execution engine runs. It is produced by
//! compiling a workflow job for one run and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::approval::{ApprovalKind, NativeApproval, VendorApproval};
use crate::domain::workflow::{ErrorPolicy, JobKind};

/// Key of the originating job name in `CompiledTask::job_info`
pub const JOB_NAME_KEY: &str = "job_name";

/// Result of compiling a workflow for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTask {
    pub workflow_name: String,
    pub task_id: i64,
    pub stages: Vec<StageTask>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTask {
    pub name: String,
    pub parallel: bool,
    pub tasks: Vec<CompiledTask>,
}

/// Executable unit produced by compiling a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledTask {
    pub name: String,
    pub key: String,
    pub display_name: String,
    pub origin_name: String,
    pub kind: JobKind,
    pub job_info: BTreeMap<String, String>,
    pub spec: TaskSpec,
    /// Minutes, zero means the executor default
    pub timeout: i64,
    pub error_policy: ErrorPolicy,
}

/// Kind-specific compiled spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskSpec {
    Approval(ApprovalTaskSpec),
    GrayRelease(GrayReleaseTaskSpec),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalTaskSpec {
    pub timeout: i64,
    #[serde(rename = "type")]
    pub kind: ApprovalKind,
    pub description: String,
    pub native_approval: Option<NativeApproval>,
    pub lark_approval: Option<VendorApproval>,
    pub dingtalk_approval: Option<VendorApproval>,
    pub workwx_approval: Option<VendorApproval>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrayReleaseTaskSpec {
    pub cluster_id: String,
    pub cluster_name: String,
    pub namespace: String,
    pub workload_type: String,
    pub workload_name: String,
    pub container_name: String,
    pub first_job: bool,
    pub gray_workload_name: String,
    pub image: String,
    pub deploy_timeout: i64,
    pub gray_scale: u32,
    pub total_replica: i32,
    pub gray_replica: i32,
}

/// Stable key of a per-target task
pub fn task_key(job_name: &str, target: &str) -> String {
    format!("{}.{}", job_name, target)
}

/// Human readable name of a per-target task
pub fn task_display_name(job_name: &str, target: &str) -> String {
    format!("{}-{}", job_name, target)
}

/// Unique task name within one workflow run
pub fn task_name(workflow_name: &str, job_name: &str, index: usize) -> String {
    format!("{}-{}-{}", workflow_name, job_name, index)
}

//! Approval gate job
//!
//! An approval job either carries its own policy (native approvers, or the
//! approval nodes of a chat vendor process) or references another approval
//! job of the same workflow and reuses its policy when compiled.

use async_trait::async_trait;
use keel_core::codec::{decode_as, encode};
use keel_core::domain::approval::{
    ApprovalKind, ApprovalNode, ApprovalSource, ApprovalSpec, Approver, NativeApproval, NodeRule,
    VendorApproval,
};
use keel_core::domain::task::{ApprovalTaskSpec, CompiledTask, JOB_NAME_KEY, TaskSpec};
use keel_core::domain::workflow::{Job, JobKind, Workflow};
use std::collections::{BTreeMap, HashSet};

use super::{JobContext, JobVariant, same_identity};
use crate::collaborator::{Feature, UserDirectory};
use crate::error::{JobError, Result};

/// DingTalk processes reject longer chains
const DINGTALK_MAX_NODES: usize = 20;

pub struct ApprovalJob {
    job: Job,
    spec: ApprovalSpec,
}

impl ApprovalJob {
    pub fn new(job: Job) -> Self {
        Self {
            job,
            spec: ApprovalSpec::default(),
        }
    }

    /// Locate and decode the approval job this one references
    ///
    /// The origin is the first approval job with the referenced name in
    /// stage order and must carry its own policy.
    fn resolve_origin(&self, workflow: &Workflow) -> Result<ApprovalSpec> {
        let name = self.spec.referenced_job_name();
        let origin = workflow.find_job(name, JobKind::Approval).ok_or_else(|| {
            JobError::OriginNotFound(format!(
                "approval job {} referenced by {} not found",
                name, self.job.name
            ))
        })?;

        let spec: ApprovalSpec = decode_as(JobKind::Approval, &origin.spec)?;
        if spec.source == ApprovalSource::FromJob {
            return Err(JobError::ReferenceMismatch(format!(
                "{} references {}, which is itself a reference",
                self.job.name, name
            )));
        }
        if spec.kind != self.spec.kind {
            return Err(JobError::ReferenceMismatch(format!(
                "{} is a {} approval but {} is a {} approval",
                name, spec.kind, self.job.name, self.spec.kind
            )));
        }

        Ok(spec)
    }

    fn lint_vendor(&self, vendor: Option<&VendorApproval>) -> Result<()> {
        let vendor = vendor.ok_or_else(|| {
            JobError::Lint(format!(
                "{}: {} approval is not configured",
                self.job.name, self.spec.kind
            ))
        })?;

        if vendor.approval_nodes.is_empty() {
            return Err(JobError::Lint(format!(
                "{}: approval process has no nodes",
                self.job.name
            )));
        }

        if self.spec.kind == ApprovalKind::DingTalk && vendor.approval_nodes.len() > DINGTALK_MAX_NODES
        {
            return Err(JobError::Lint(format!(
                "{}: approval process cannot exceed {} nodes",
                self.job.name, DINGTALK_MAX_NODES
            )));
        }

        let mut seen = HashSet::new();
        for (index, node) in vendor.approval_nodes.iter().enumerate() {
            lint_node(&self.job.name, index, node)?;

            if self.spec.kind == ApprovalKind::DingTalk {
                for approver in &node.approve_users {
                    if !seen.insert(approver.id()) {
                        return Err(JobError::Lint(format!(
                            "{}: approver {} appears in more than one node",
                            self.job.name,
                            approver.display_name()
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    fn compiled_task(&self, spec: ApprovalTaskSpec) -> CompiledTask {
        CompiledTask {
            name: self.job.name.clone(),
            key: self.job.name.clone(),
            display_name: self.job.name.clone(),
            origin_name: self.job.name.clone(),
            kind: JobKind::Approval,
            job_info: BTreeMap::from([(JOB_NAME_KEY.to_string(), self.job.name.clone())]),
            timeout: spec.timeout,
            spec: TaskSpec::Approval(spec),
            error_policy: self.job.error_policy.clone(),
        }
    }
}

fn lint_node(job_name: &str, index: usize, node: &ApprovalNode) -> Result<()> {
    if node.approve_users.is_empty() {
        return Err(JobError::Lint(format!(
            "{}: approval node {} has no approver",
            job_name, index
        )));
    }
    if node.rule == NodeRule::Unspecified {
        return Err(JobError::Lint(format!(
            "{}: approval node {} rule must be AND or OR",
            job_name, index
        )));
    }
    Ok(())
}

/// Expand groups into their members, keeping first-seen order without duplicates
async fn flatten_approvers(
    users: &dyn UserDirectory,
    approvers: &[Approver],
) -> Result<Vec<Approver>> {
    let mut seen = HashSet::new();
    let mut flat = Vec::new();

    for approver in approvers {
        match approver {
            Approver::User { user_id, .. } => {
                if seen.insert(user_id.clone()) {
                    flat.push(approver.clone());
                }
            }
            Approver::Group { group_id, .. } => {
                let members = users
                    .group_members(group_id)
                    .await
                    .map_err(|e| JobError::Store(format!("{:#}", e)))?;
                for member in members {
                    if seen.insert(member.user_id.clone()) {
                        flat.push(Approver::user(member.user_id, member.user_name));
                    }
                }
            }
        }
    }

    Ok(flat)
}

fn vendor_block_mut(spec: &mut ApprovalTaskSpec) -> Option<&mut Option<VendorApproval>> {
    match spec.kind {
        ApprovalKind::Native => None,
        ApprovalKind::Lark => Some(&mut spec.lark_approval),
        ApprovalKind::DingTalk => Some(&mut spec.dingtalk_approval),
        ApprovalKind::WorkWx => Some(&mut spec.workwx_approval),
    }
}

#[async_trait]
impl JobVariant for ApprovalJob {
    fn name(&self) -> &str {
        &self.job.name
    }

    fn kind(&self) -> JobKind {
        JobKind::Approval
    }

    fn instantiate(&mut self) -> Result<()> {
        self.spec = decode_as(JobKind::Approval, &self.job.spec)?;
        Ok(())
    }

    async fn set_preset(&mut self, _ctx: &JobContext<'_>) -> Result<()> {
        if self.spec.source == ApprovalSource::FromJob {
            self.spec.origin_job_name = self.spec.job_name.clone();
        }
        Ok(())
    }

    async fn set_options(&mut self, _ctx: &JobContext<'_>) -> Result<()> {
        Ok(())
    }

    fn clear_options(&mut self) -> Result<()> {
        Ok(())
    }

    fn clear_selection_field(&mut self) -> Result<()> {
        Ok(())
    }

    fn merge_args(&mut self, args: &Job) -> Result<()> {
        if same_identity(&self.job, args) {
            self.spec = decode_as(JobKind::Approval, &args.spec)?;
        }
        Ok(())
    }

    async fn update_with_latest_setting(&mut self, ctx: &JobContext<'_>) -> Result<()> {
        let latest = ctx.latest_saved_job(&self.job.name, JobKind::Approval).await?;
        self.spec = decode_as(JobKind::Approval, &latest.spec)?;
        Ok(())
    }

    async fn to_jobs(&mut self, ctx: &JobContext<'_>, _task_id: i64) -> Result<Vec<CompiledTask>> {
        let users = ctx.collaborators.users.as_ref();
        let mut task_spec = ApprovalTaskSpec {
            timeout: self.spec.timeout,
            kind: self.spec.kind,
            description: self.spec.description.clone(),
            native_approval: self.spec.native_approval.clone(),
            lark_approval: self.spec.lark_approval.clone(),
            dingtalk_approval: self.spec.dingtalk_approval.clone(),
            workwx_approval: self.spec.workwx_approval.clone(),
        };

        if self.spec.source == ApprovalSource::Direct {
            if let Some(native) = task_spec.native_approval.as_mut() {
                native.approve_users = flatten_approvers(users, &native.approve_users).await?;
            }
            return Ok(vec![self.compiled_task(task_spec)]);
        }

        if !self.spec.origin_job_name.is_empty() {
            self.spec.job_name = self.spec.origin_job_name.clone();
        }
        let origin = self.resolve_origin(ctx.workflow)?;
        let origin_name = self.spec.referenced_job_name().to_string();

        if self.spec.kind == ApprovalKind::Native {
            let native = origin.native_approval.ok_or_else(|| {
                JobError::ReferenceMismatch(format!("{} has no native approval policy", origin_name))
            })?;
            task_spec.native_approval = Some(NativeApproval {
                approve_users: flatten_approvers(users, &native.approve_users).await?,
                needed_approvers: native.needed_approvers,
            });
        } else if let Some(block) = vendor_block_mut(&mut task_spec) {
            let origin_block = origin.vendor_approval().ok_or_else(|| {
                JobError::ReferenceMismatch(format!(
                    "{} has no {} approval process",
                    origin_name, origin.kind
                ))
            })?;
            let own_id = block.as_ref().map(|b| b.id.as_str()).unwrap_or_default();
            if own_id != origin_block.id {
                return Err(JobError::ReferenceMismatch(format!(
                    "{} approval process {} differs from {} of {}",
                    self.job.name, own_id, origin_block.id, origin_name
                )));
            }
            *block = Some(origin_block.clone());
        }

        Ok(vec![self.compiled_task(task_spec)])
    }

    async fn lint_job(&self, ctx: &JobContext<'_>) -> Result<()> {
        if self.spec.kind.is_vendor() {
            ctx.collaborators
                .license
                .check_license(Feature::VendorApproval)
                .map_err(|e| JobError::License(format!("{}: {:#}", self.job.name, e)))?;
        }

        if self.spec.source == ApprovalSource::FromJob {
            self.resolve_origin(ctx.workflow)?;
            return Ok(());
        }

        match self.spec.kind {
            ApprovalKind::Native => {
                let native = self.spec.native_approval.as_ref().ok_or_else(|| {
                    JobError::Lint(format!("{}: native approval is not configured", self.job.name))
                })?;
                let approvers =
                    flatten_approvers(ctx.collaborators.users.as_ref(), &native.approve_users)
                        .await?;
                if approvers.len() < native.needed_approvers {
                    return Err(JobError::Lint(format!(
                        "{}: {} approver(s) configured but {} needed",
                        self.job.name,
                        approvers.len(),
                        native.needed_approvers
                    )));
                }
                Ok(())
            }
            _ => self.lint_vendor(self.spec.vendor_approval()),
        }
    }

    fn into_job(self: Box<Self>) -> Job {
        let mut job = self.job;
        job.spec = encode(&self.spec);
        job
    }
}

//! Approval job spec types

use serde::{Deserialize, Serialize};

/// Typed spec of an approval job
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApprovalSpec {
    /// Minutes before the gate times out
    #[serde(default)]
    pub timeout: i64,
    #[serde(rename = "type")]
    pub kind: ApprovalKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source: ApprovalSource,
    /// Name of the referenced job as entered by the user
    #[serde(default)]
    pub job_name: String,
    /// Snapshot of `job_name` taken by the preset step
    #[serde(default)]
    pub origin_job_name: String,
    #[serde(default)]
    pub native_approval: Option<NativeApproval>,
    #[serde(default)]
    pub lark_approval: Option<VendorApproval>,
    #[serde(default)]
    pub dingtalk_approval: Option<VendorApproval>,
    #[serde(default)]
    pub workwx_approval: Option<VendorApproval>,
}

/// Approval channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalKind {
    #[default]
    Native,
    Lark,
    #[serde(rename = "dingtalk")]
    DingTalk,
    #[serde(rename = "workwx")]
    WorkWx,
}

impl ApprovalKind {
    /// Whether the channel is an external chat vendor
    pub fn is_vendor(&self) -> bool {
        !matches!(self, ApprovalKind::Native)
    }
}

impl std::fmt::Display for ApprovalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalKind::Native => write!(f, "native"),
            ApprovalKind::Lark => write!(f, "lark"),
            ApprovalKind::DingTalk => write!(f, "dingtalk"),
            ApprovalKind::WorkWx => write!(f, "workwx"),
        }
    }
}

/// Where the approval policy comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalSource {
    #[default]
    #[serde(alias = "")]
    Direct,
    /// Policy is copied from another approval job of the same workflow
    #[serde(rename = "fromjob")]
    FromJob,
}

/// Built-in approval policy
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NativeApproval {
    #[serde(default)]
    pub approve_users: Vec<Approver>,
    #[serde(default)]
    pub needed_approvers: usize,
}

/// Policy forwarded to an external approval process
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VendorApproval {
    /// External approval-process identifier
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub approval_nodes: Vec<ApprovalNode>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApprovalNode {
    #[serde(default)]
    pub approve_users: Vec<Approver>,
    #[serde(rename = "type", default)]
    pub rule: NodeRule,
}

/// How the approvers of one node aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NodeRule {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
    /// Missing or unrecognized rule, rejected by lint
    #[default]
    #[serde(rename = "", other)]
    Unspecified,
}

/// An approver entry: a single user or a group to be expanded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Approver {
    User {
        user_id: String,
        #[serde(default)]
        user_name: String,
    },
    Group {
        group_id: String,
        #[serde(default)]
        group_name: String,
    },
}

impl Approver {
    pub fn user(user_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Approver::User {
            user_id: user_id.into(),
            user_name: user_name.into(),
        }
    }

    pub fn group(group_id: impl Into<String>, group_name: impl Into<String>) -> Self {
        Approver::Group {
            group_id: group_id.into(),
            group_name: group_name.into(),
        }
    }

    /// Identifier used for duplicate detection across nodes
    pub fn id(&self) -> &str {
        match self {
            Approver::User { user_id, .. } => user_id,
            Approver::Group { group_id, .. } => group_id,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Approver::User { user_name, .. } => user_name,
            Approver::Group { group_name, .. } => group_name,
        }
    }
}

impl ApprovalSpec {
    /// The vendor block matching this spec's kind
    pub fn vendor_approval(&self) -> Option<&VendorApproval> {
        match self.kind {
            ApprovalKind::Native => None,
            ApprovalKind::Lark => self.lark_approval.as_ref(),
            ApprovalKind::DingTalk => self.dingtalk_approval.as_ref(),
            ApprovalKind::WorkWx => self.workwx_approval.as_ref(),
        }
    }

    /// Name of the job this spec references, preferring the preset snapshot
    pub fn referenced_job_name(&self) -> &str {
        if self.origin_job_name.is_empty() {
            &self.job_name
        } else {
            &self.origin_job_name
        }
    }
}

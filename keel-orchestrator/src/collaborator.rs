//! External collaborators of the job compiler
//!
//! The compiler never talks to storage, clusters or licensing directly. It
//! goes through these traits so each concern can be swapped (and faked in
//! tests) independently:
//! - [`WorkflowStore`]: latest saved workflow definitions
//! - [`ClusterClient`]: read-only live cluster state
//! - [`LicenseChecker`]: edition-gated features
//! - [`UserDirectory`]: approver group membership

use anyhow::{Context, Result};
use async_trait::async_trait;
use keel_client::PlatformClient;
use keel_core::domain::workflow::Workflow;
use keel_core::dto::cluster::GroupMember;
use std::sync::Arc;

/// Persistence of saved workflow definitions
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Latest saved definition, `None` if never saved
    async fn find_saved_workflow(&self, name: &str) -> Result<Option<Workflow>>;

    /// Insert or replace a definition
    async fn save_workflow(&self, workflow: &Workflow) -> Result<()>;
}

/// Read-only access to live cluster state
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Replica count of a deployment, `None` if it does not exist
    async fn deployment_replicas(
        &self,
        cluster_id: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<i32>>;

    /// Display name of a cluster, `None` if unknown
    async fn cluster_name(&self, cluster_id: &str) -> Result<Option<String>>;
}

/// Features gated by the product edition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    GrayRelease,
    VendorApproval,
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Feature::GrayRelease => write!(f, "gray release"),
            Feature::VendorApproval => write!(f, "vendor approval"),
        }
    }
}

pub trait LicenseChecker: Send + Sync {
    fn check_license(&self, feature: Feature) -> Result<()>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn group_members(&self, group_id: &str) -> Result<Vec<GroupMember>>;
}

/// Everything a job variant may call out to
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn WorkflowStore>,
    pub cluster: Arc<dyn ClusterClient>,
    pub license: Arc<dyn LicenseChecker>,
    pub users: Arc<dyn UserDirectory>,
}

// =============================================================================
// Platform-backed implementations
// =============================================================================

#[async_trait]
impl ClusterClient for PlatformClient {
    async fn deployment_replicas(
        &self,
        cluster_id: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<i32>> {
        PlatformClient::deployment_replicas(self, cluster_id, namespace, name)
            .await
            .with_context(|| format!("Failed to get deployment {}/{}", namespace, name))
    }

    async fn cluster_name(&self, cluster_id: &str) -> Result<Option<String>> {
        PlatformClient::cluster_name(self, cluster_id)
            .await
            .with_context(|| format!("Failed to get cluster {}", cluster_id))
    }
}

#[async_trait]
impl UserDirectory for PlatformClient {
    async fn group_members(&self, group_id: &str) -> Result<Vec<GroupMember>> {
        PlatformClient::group_members(self, group_id)
            .await
            .with_context(|| format!("Failed to list members of group {}", group_id))
    }
}

/// Product edition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edition {
    Community,
    Professional,
}

impl std::str::FromStr for Edition {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "community" => Ok(Edition::Community),
            "professional" => Ok(Edition::Professional),
            other => anyhow::bail!("unknown edition: {}", other),
        }
    }
}

/// License checker driven by the configured edition
#[derive(Debug, Clone, Copy)]
pub struct EditionLicense {
    edition: Edition,
}

impl EditionLicense {
    pub fn new(edition: Edition) -> Self {
        Self { edition }
    }
}

impl LicenseChecker for EditionLicense {
    fn check_license(&self, feature: Feature) -> Result<()> {
        match self.edition {
            Edition::Professional => Ok(()),
            Edition::Community => {
                anyhow::bail!("{} requires the professional edition", feature)
            }
        }
    }
}

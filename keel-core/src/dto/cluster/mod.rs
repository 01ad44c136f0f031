//! Cluster DTOs returned by the platform's cluster endpoints

use serde::{Deserialize, Serialize};

/// Live state of a Deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentInfo {
    pub name: String,
    pub namespace: String,
    pub replicas: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub id: String,
    pub name: String,
}

/// Member of an approver group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMember {
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
}

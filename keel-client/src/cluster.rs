//! Cluster and user directory endpoints

use crate::PlatformClient;
use crate::error::Result;
use keel_core::dto::cluster::{ClusterInfo, DeploymentInfo, GroupMember};

impl PlatformClient {
    // =============================================================================
    // Cluster State
    // =============================================================================

    /// Get a live deployment
    ///
    /// # Returns
    /// `None` if the deployment does not exist in that namespace
    pub async fn get_deployment(
        &self,
        cluster_id: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DeploymentInfo>> {
        let url = self.url(&format!(
            "cluster/{}/namespaces/{}/deployments/{}",
            cluster_id, namespace, name
        ));
        let response = self.send(|| self.client.get(&url)).await?;

        self.handle_optional_response(response).await
    }

    /// Get the live replica count of a deployment
    pub async fn deployment_replicas(
        &self,
        cluster_id: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<i32>> {
        Ok(self
            .get_deployment(cluster_id, namespace, name)
            .await?
            .map(|deployment| deployment.replicas))
    }

    /// Get a cluster record
    pub async fn get_cluster(&self, cluster_id: &str) -> Result<Option<ClusterInfo>> {
        let url = self.url(&format!("cluster/{}", cluster_id));
        let response = self.send(|| self.client.get(&url)).await?;

        self.handle_optional_response(response).await
    }

    /// Get the display name of a cluster
    pub async fn cluster_name(&self, cluster_id: &str) -> Result<Option<String>> {
        Ok(self
            .get_cluster(cluster_id)
            .await?
            .map(|cluster| cluster.name))
    }

    // =============================================================================
    // User Directory
    // =============================================================================

    /// List the members of a user group
    pub async fn group_members(&self, group_id: &str) -> Result<Vec<GroupMember>> {
        let url = self.url(&format!("user/groups/{}/members", group_id));
        let response = self.send(|| self.client.get(&url)).await?;

        self.handle_response(response).await
    }
}

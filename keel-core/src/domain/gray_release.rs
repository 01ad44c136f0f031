//! Gray-release (canary) job spec types

use serde::{Deserialize, Serialize};

/// Suffix appended to a workload name to name its canary copy
pub const GRAY_WORKLOAD_SUFFIX: &str = "-keel-gray";

/// Typed spec of a gray-release job
///
/// A chain of gray-release jobs shares one target set. The first job of the
/// chain has an empty `from_job`; every other job names the first job.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GrayReleaseSpec {
    #[serde(default)]
    pub cluster_id: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub docker_registry_id: String,
    /// Name of the first job of the chain, empty for the first job itself
    #[serde(default)]
    pub from_job: String,
    /// Canary percentage, 0 to 100
    #[serde(default)]
    pub gray_scale: u32,
    /// Minutes to wait for the rollout
    #[serde(default)]
    pub deploy_timeout: i64,
    #[serde(default)]
    pub targets: Vec<GrayReleaseTarget>,
    /// Selectable targets offered to the user, never compiled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_options: Option<Vec<GrayReleaseTarget>>,
}

/// A workload container to roll out
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GrayReleaseTarget {
    pub workload_type: String,
    pub workload_name: String,
    pub container_name: String,
    #[serde(default)]
    pub image: String,
    /// Live replica count, recorded when the first job compiles
    #[serde(default)]
    pub replica: i32,
}

impl GrayReleaseSpec {
    /// Whether this job starts its chain
    pub fn is_first_job(&self) -> bool {
        self.from_job.is_empty()
    }
}

impl GrayReleaseTarget {
    /// Identity of a target across edits, ignoring image and replicas
    pub fn identity(&self) -> (&str, &str, &str) {
        (&self.workload_type, &self.workload_name, &self.container_name)
    }

    /// Replicas the canary workload should run at `gray_scale` percent
    pub fn gray_replica(&self, gray_scale: u32) -> i32 {
        (f64::from(self.replica) * f64::from(gray_scale) / 100.0).ceil() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(name: &str, replica: i32) -> GrayReleaseTarget {
        GrayReleaseTarget {
            workload_type: "Deployment".to_string(),
            workload_name: name.to_string(),
            container_name: name.to_string(),
            image: format!("registry/{}:v2", name),
            replica,
        }
    }

    #[test]
    fn test_gray_replica_rounds_up() {
        assert_eq!(target("api", 10).gray_replica(40), 4);
        assert_eq!(target("web", 7).gray_replica(40), 3);
        assert_eq!(target("web", 7).gray_replica(100), 7);
        assert_eq!(target("web", 7).gray_replica(0), 0);
    }

    #[test]
    fn test_identity_ignores_image_and_replicas() {
        let mut other = target("api", 3);
        other.image = "registry/api:v9".to_string();
        assert_eq!(target("api", 10).identity(), other.identity());
    }
}

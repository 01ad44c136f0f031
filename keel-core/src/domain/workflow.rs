//! Workflow domain types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Workflow definition
///
/// Structure shared between orchestrator (persists, compiles) and the
/// platform API (stores user edits).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub stages: Vec<Stage>,
}

/// An ordered group of jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    /// Jobs of a parallel stage share one execution rank
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    #[serde(default)]
    pub jobs: Vec<Job>,
}

fn default_parallel() -> bool {
    true
}

/// One typed step of a workflow stage
///
/// The spec payload is stored untyped; its shape depends on `kind` and is
/// decoded through [`crate::codec::JobSpec`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub kind: JobKind,
    #[serde(default)]
    pub spec: serde_json::Value,
    #[serde(default)]
    pub error_policy: ErrorPolicy,
}

/// Job kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    #[serde(rename = "approval")]
    Approval,
    #[serde(rename = "k8s-gray-release")]
    GrayRelease,
    /// Kinds this build does not know how to compile
    #[serde(other)]
    Other,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Approval => write!(f, "approval"),
            JobKind::GrayRelease => write!(f, "k8s-gray-release"),
            JobKind::Other => write!(f, "other"),
        }
    }
}

/// What the executor does when a task fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPolicy {
    pub policy: ErrorPolicyKind,
    #[serde(default)]
    pub maximum_retry: u32,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self {
            policy: ErrorPolicyKind::Stop,
            maximum_retry: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicyKind {
    Stop,
    Ignore,
    Retry,
    ManualCheck,
}

impl Workflow {
    /// Iterate over all jobs in stage order
    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.stages.iter().flat_map(|stage| stage.jobs.iter())
    }

    /// Find the first job in stage order with the given name and kind
    ///
    /// Job names are unique within a valid workflow, but saved definitions
    /// are not guaranteed valid, so the first match wins.
    pub fn find_job(&self, name: &str, kind: JobKind) -> Option<&Job> {
        self.jobs().find(|job| job.name == name && job.kind == kind)
    }

    /// Execution rank of every job, keyed by job name
    ///
    /// Jobs of a parallel stage share the stage's rank; in a serial stage each
    /// job takes the next rank. The rank always advances between stages.
    pub fn job_ranks(&self) -> HashMap<String, usize> {
        let mut ranks = HashMap::new();
        let mut rank = 0;
        for stage in &self.stages {
            for job in &stage.jobs {
                ranks.entry(job.name.clone()).or_insert(rank);
                if !stage.parallel {
                    rank += 1;
                }
            }
            rank += 1;
        }
        ranks
    }

    /// Names that appear on more than one job
    pub fn duplicate_job_names(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut duplicates = Vec::new();
        for job in self.jobs() {
            if !seen.insert(job.name.as_str()) && !duplicates.contains(&job.name) {
                duplicates.push(job.name.clone());
            }
        }
        duplicates
    }
}

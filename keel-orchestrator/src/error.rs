//! Job lifecycle errors

use keel_core::codec::DecodeError;
use keel_core::domain::workflow::JobKind;
use thiserror::Error;

/// Errors raised by job variants and the workflow compiler
#[derive(Debug, Error)]
pub enum JobError {
    /// Spec payload does not match the job kind's schema
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A referenced workflow or job does not exist
    #[error("origin not found: {0}")]
    OriginNotFound(String),

    /// A referenced job exists but cannot be used as the origin
    #[error("reference mismatch: {0}")]
    ReferenceMismatch(String),

    /// Live cluster state is unavailable or the object is absent
    #[error("cluster lookup failed: {0}")]
    ClusterLookup(String),

    #[error("{0}")]
    Lint(String),

    #[error("license check failed: {0}")]
    License(String),

    #[error("compile failed: {0}")]
    Compile(String),

    /// The workflow store or user directory failed
    #[error("store error: {0}")]
    Store(String),

    #[error("unsupported job kind: {0}")]
    UnsupportedKind(JobKind),
}

pub type Result<T> = std::result::Result<T, JobError>;

impl JobError {
    /// Whether the error is a problem with the workflow definition itself
    ///
    /// Validation errors are reported back to the author; everything else is
    /// an infrastructure failure.
    pub fn is_validation(&self) -> bool {
        !matches!(self, JobError::ClusterLookup(_) | JobError::Store(_))
    }
}

//! Spec codec
//!
//! Converts the untyped spec payload stored on a [`Job`](crate::domain::workflow::Job) into the typed spec
//! of its kind, and back for re-storage.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::domain::approval::ApprovalSpec;
use crate::domain::gray_release::GrayReleaseSpec;
use crate::domain::workflow::JobKind;

/// Errors raised while decoding a job spec
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload does not match the kind's schema
    #[error("malformed {kind} spec: {source}")]
    Malformed {
        kind: JobKind,
        #[source]
        source: serde_json::Error,
    },

    /// The kind has no typed spec in this build
    #[error("no spec codec for job kind {0}")]
    UnsupportedKind(JobKind),
}

/// Typed job spec, keyed by job kind
#[derive(Debug, Clone, PartialEq)]
pub enum JobSpec {
    Approval(ApprovalSpec),
    GrayRelease(GrayReleaseSpec),
}

impl JobSpec {
    /// Decode an untyped payload for the given kind
    pub fn decode(kind: JobKind, value: &serde_json::Value) -> Result<Self, DecodeError> {
        match kind {
            JobKind::Approval => decode_as(kind, value).map(JobSpec::Approval),
            JobKind::GrayRelease => decode_as(kind, value).map(JobSpec::GrayRelease),
            JobKind::Other => Err(DecodeError::UnsupportedKind(kind)),
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            JobSpec::Approval(_) => JobKind::Approval,
            JobSpec::GrayRelease(_) => JobKind::GrayRelease,
        }
    }

    /// Encode back into the stored payload form
    pub fn encode(&self) -> serde_json::Value {
        match self {
            JobSpec::Approval(spec) => encode(spec),
            JobSpec::GrayRelease(spec) => encode(spec),
        }
    }
}

/// Decode a payload into a concrete spec type
pub fn decode_as<T: DeserializeOwned>(
    kind: JobKind,
    value: &serde_json::Value,
) -> Result<T, DecodeError> {
    T::deserialize(value).map_err(|source| DecodeError::Malformed { kind, source })
}

/// Encode a concrete spec type into its stored form
pub fn encode<T: Serialize>(spec: &T) -> serde_json::Value {
    // Spec types are plain data with string keys, serialization cannot fail
    serde_json::to_value(spec).unwrap_or(serde_json::Value::Null)
}

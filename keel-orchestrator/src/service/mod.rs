//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services drive job variants and talk to collaborators.

pub mod workflow;

// Re-export for convenience
pub use workflow as workflow_service;

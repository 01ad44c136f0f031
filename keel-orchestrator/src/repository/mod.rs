//! Repository Module
//!
//! Data access layer for the orchestrator.
//! Each repository handles database operations for a specific domain entity.

pub mod workflow;

pub use workflow::PgWorkflowStore;

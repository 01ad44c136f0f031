//! Keel Core
//!
//! Core types and abstractions for the Keel CI/CD system.
//!
//! This crate contains:
//! - Domain types: Core business entities (Workflow, Job, Trigger, etc.)
//! - Codec: Typed job specs decoded from and encoded to their stored form
//! - DTOs: Data transfer objects for inter-service communication

pub mod codec;
pub mod domain;
pub mod dto;

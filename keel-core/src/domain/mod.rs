//! Core domain types
//!
//! This module contains the core domain structures used across Keel services.
//! These types represent the fundamental business entities and are shared between
//! orchestrator (for compilation and persistence) and scheduler (for triggering).

pub mod approval;
pub mod gray_release;
pub mod task;
pub mod trigger;
pub mod workflow;

//! Data Transfer Objects for inter-service communication
//!
//! This module contains DTOs used for communication between Keel services
//! (orchestrator, scheduler, platform API, CLI). DTOs are lightweight
//! request/response shapes that wrap the domain entities.

pub mod cluster;
pub mod cronjob;
pub mod workflow;

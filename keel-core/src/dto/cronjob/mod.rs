//! Cronjob DTOs exchanged between the platform and the scheduler

use serde::{Deserialize, Serialize};

use crate::domain::trigger::{EngineKind, Trigger, TriggerKind};

/// Change notification for the triggers of one entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronjobMessage {
    pub name: String,
    #[serde(default)]
    pub product_name: String,
    pub action: CronjobAction,
    pub kind: TriggerKind,
    pub engine: EngineKind,
    /// Triggers to register (enable only)
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    /// Trigger IDs to remove before registering (enable only)
    #[serde(default)]
    pub delete_list: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CronjobAction {
    Enable,
    Disable,
}

/// Request to persist the disabled state of an entity's triggers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisableTriggers {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TriggerKind,
}

/// Test run arguments sent when a test trigger fires
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestTaskArgs {
    pub test_name: String,
    pub product_name: String,
    pub test_task_creator: String,
}

/// IDs currently registered in each engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisteredTriggers {
    pub recurring: Vec<String>,
    pub one_shot: Vec<String>,
}

//! Trigger domain types
//!
//! A trigger is the scheduler's registration unit. It is created or updated
//! when its owning entity is saved with scheduling enabled and is re-created
//! from the platform on every scheduler restart.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Creator name reported to the platform for scheduled runs
pub const CRON_TASK_CREATOR: &str = "timer";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: String,
    /// Name of the owning entity (workflow, test, environment, release plan)
    pub name: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub schedule: Schedule,
    pub payload: TriggerPayload,
}

fn default_enabled() -> bool {
    true
}

/// When a trigger fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schedule {
    /// Five-field user cron expression (minute hour day month weekday)
    Crontab { cron: String },
    /// Fixed clock time, daily or on one weekday
    Timing { time: String, frequency: Frequency },
    /// Every `number` minutes or hours
    Gap { frequency: Frequency, number: u64 },
    /// One-shot absolute instant, seconds since the epoch
    UnixStamp { unix_stamp: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Day,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
    Minutes,
    Hours,
}

/// Which engine a trigger belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Recurring,
    OneShot,
}

/// Remote action selected by a trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "args", rename_all = "snake_case")]
pub enum TriggerPayload {
    Workflow(serde_json::Value),
    #[serde(rename = "test")]
    Testing,
    EnvAnalysis(EnvAnalysisArgs),
    EnvSleep(EnvSleepArgs),
    ReleasePlan(ReleasePlanArgs),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvAnalysisArgs {
    pub env_name: String,
    pub product_name: String,
    #[serde(default)]
    pub production: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvSleepArgs {
    pub env_name: String,
    pub product_name: String,
    #[serde(default)]
    pub production: bool,
    pub action: SleepAction,
}

/// `Enable` puts the environment to sleep, `Disable` wakes it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepAction {
    Enable,
    Disable,
}

impl std::fmt::Display for SleepAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SleepAction::Enable => write!(f, "enable"),
            SleepAction::Disable => write!(f, "disable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleasePlanArgs {
    pub id: String,
    pub name: String,
    pub index: i64,
}

/// Trigger kind used to address an entity's triggers on the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Workflow,
    #[serde(rename = "test")]
    Testing,
    EnvAnalysis,
    EnvSleep,
    ReleasePlan,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Workflow => "workflow",
            TriggerKind::Testing => "test",
            TriggerKind::EnvAnalysis => "env_analysis",
            TriggerKind::EnvSleep => "env_sleep",
            TriggerKind::ReleasePlan => "release_plan",
        }
    }
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TriggerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "workflow" => Ok(TriggerKind::Workflow),
            "test" => Ok(TriggerKind::Testing),
            "env_analysis" => Ok(TriggerKind::EnvAnalysis),
            "env_sleep" => Ok(TriggerKind::EnvSleep),
            "release_plan" => Ok(TriggerKind::ReleasePlan),
            other => Err(format!("unknown trigger kind: {}", other)),
        }
    }
}

impl TriggerPayload {
    pub fn kind(&self) -> TriggerKind {
        match self {
            TriggerPayload::Workflow(_) => TriggerKind::Workflow,
            TriggerPayload::Testing => TriggerKind::Testing,
            TriggerPayload::EnvAnalysis(_) => TriggerKind::EnvAnalysis,
            TriggerPayload::EnvSleep(_) => TriggerKind::EnvSleep,
            TriggerPayload::ReleasePlan(_) => TriggerKind::ReleasePlan,
        }
    }
}

impl Schedule {
    /// Engine that owns triggers with this schedule
    pub fn engine(&self) -> EngineKind {
        match self {
            Schedule::UnixStamp { .. } => EngineKind::OneShot,
            _ => EngineKind::Recurring,
        }
    }

    /// Absolute instant of a one-shot schedule
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Schedule::UnixStamp { unix_stamp } => Utc.timestamp_opt(*unix_stamp, 0).single(),
            _ => None,
        }
    }
}

impl Trigger {
    pub fn kind(&self) -> TriggerKind {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_wire_format() {
        let trigger: Trigger = serde_json::from_value(serde_json::json!({
            "id": "65f0c1",
            "name": "nightly",
            "schedule": { "type": "timing", "time": "02:30", "frequency": "day" },
            "payload": { "kind": "workflow", "args": { "name": "nightly" } },
        }))
        .unwrap();

        assert!(trigger.enabled);
        assert_eq!(trigger.kind(), TriggerKind::Workflow);
        assert_eq!(trigger.schedule.engine(), EngineKind::Recurring);
    }

    #[test]
    fn test_unix_stamp_schedule_is_one_shot() {
        let schedule = Schedule::UnixStamp {
            unix_stamp: 1_700_000_000,
        };
        assert_eq!(schedule.engine(), EngineKind::OneShot);
        assert_eq!(schedule.instant().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_trigger_kind_parsing() {
        assert_eq!("test".parse::<TriggerKind>().unwrap(), TriggerKind::Testing);
        assert_eq!(TriggerKind::EnvSleep.to_string(), "env_sleep");
        assert!("pipeline".parse::<TriggerKind>().is_err());
    }
}

//! Remote actions behind fired triggers
//!
//! Every trigger kind maps to one platform call. The call is made once; the
//! HTTP transport only repeats it when the platform was never reached.

use keel_core::domain::trigger::{CRON_TASK_CREATOR, Trigger, TriggerPayload};
use keel_core::dto::cronjob::TestTaskArgs;
use std::sync::Arc;

use crate::platform::ActionInvoker;

/// A platform call: API path segments, query parameters and optional JSON body
///
/// Segments and query values are left unencoded; the transport encodes them.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCall {
    pub segments: Vec<String>,
    pub query: Vec<(&'static str, String)>,
    pub payload: Option<serde_json::Value>,
}

impl RemoteCall {
    fn post(segments: &[&str], query: Vec<(&'static str, String)>) -> Self {
        Self {
            segments: segments.iter().map(|s| s.to_string()).collect(),
            query,
            payload: None,
        }
    }

    fn with_payload(mut self, payload: Option<serde_json::Value>) -> Self {
        self.payload = payload;
        self
    }

    /// Build the call a trigger makes when it fires
    pub fn for_trigger(trigger: &Trigger) -> Self {
        let creator = || CRON_TASK_CREATOR.to_string();

        match &trigger.payload {
            TriggerPayload::Workflow(args) => RemoteCall::post(
                &["workflow", "v4", "workflowtask", "trigger"],
                vec![("triggerName", creator())],
            )
            .with_payload(Some(args.clone())),
            TriggerPayload::Testing => {
                let args = TestTaskArgs {
                    test_name: trigger.name.clone(),
                    product_name: trigger.product_name.clone(),
                    test_task_creator: creator(),
                };
                RemoteCall::post(&["testing", "testtask"], Vec::new())
                    .with_payload(serde_json::to_value(args).ok())
            }
            TriggerPayload::EnvAnalysis(args) => RemoteCall::post(
                &["environment", "environments", args.env_name.as_str(), "analysis"],
                vec![
                    ("projectName", args.product_name.clone()),
                    ("triggerName", creator()),
                    ("userName", creator()),
                    ("production", args.production.to_string()),
                ],
            ),
            TriggerPayload::EnvSleep(args) => RemoteCall::post(
                &["environment", "environments", args.env_name.as_str(), "sleep"],
                vec![
                    ("projectName", args.product_name.clone()),
                    ("action", args.action.to_string()),
                    ("production", args.production.to_string()),
                ],
            ),
            TriggerPayload::ReleasePlan(args) => RemoteCall::post(
                &["release_plan", "v1", args.id.as_str(), "schedule_execute"],
                vec![("jobID", trigger.id.clone())],
            ),
        }
    }

    /// Slash-joined path, for logs
    pub fn path(&self) -> String {
        self.segments.join("/")
    }
}

/// What an engine runs when a trigger fires
pub struct Firing {
    pub trigger_id: String,
    pub name: String,
    pub call: RemoteCall,
    invoker: Arc<dyn ActionInvoker>,
}

impl Firing {
    pub fn new(trigger: &Trigger, invoker: Arc<dyn ActionInvoker>) -> Self {
        Self {
            trigger_id: trigger.id.clone(),
            name: trigger.name.clone(),
            call: RemoteCall::for_trigger(trigger),
            invoker,
        }
    }

    /// Invoke the remote action, logging the outcome
    pub async fn fire(&self) {
        tracing::info!(
            "Trigger {} ({}) fired: POST {}",
            self.trigger_id,
            self.name,
            self.call.path()
        );

        if let Err(e) = self.invoker.invoke_remote_action(&self.call).await {
            tracing::error!(
                "[{}] scheduled action for trigger {} failed: {:#}",
                self.name,
                self.trigger_id,
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::testing::RecordingInvoker;
    use keel_core::domain::trigger::{
        EnvAnalysisArgs, EnvSleepArgs, ReleasePlanArgs, Schedule, SleepAction,
    };
    use serde_json::json;

    fn trigger(payload: TriggerPayload) -> Trigger {
        Trigger {
            id: "65f0c1".to_string(),
            name: "nightly".to_string(),
            product_name: "shop".to_string(),
            enabled: true,
            schedule: Schedule::Crontab {
                cron: "0 2 * * *".to_string(),
            },
            payload,
        }
    }

    #[test]
    fn test_workflow_call_forwards_args() {
        let args = json!({ "name": "nightly", "params": [] });
        let call = RemoteCall::for_trigger(&trigger(TriggerPayload::Workflow(args.clone())));

        assert_eq!(call.path(), "workflow/v4/workflowtask/trigger");
        assert_eq!(call.query, vec![("triggerName", "timer".to_string())]);
        assert_eq!(call.payload, Some(args));
    }

    #[test]
    fn test_test_call_names_the_creator() {
        let call = RemoteCall::for_trigger(&trigger(TriggerPayload::Testing));

        assert_eq!(call.path(), "testing/testtask");
        assert!(call.query.is_empty());
        assert_eq!(
            call.payload,
            Some(json!({
                "test_name": "nightly",
                "product_name": "shop",
                "test_task_creator": "timer",
            }))
        );
    }

    #[test]
    fn test_env_calls_carry_query() {
        let call = RemoteCall::for_trigger(&trigger(TriggerPayload::EnvAnalysis(
            EnvAnalysisArgs {
                env_name: "dev".to_string(),
                product_name: "shop".to_string(),
                production: false,
            },
        )));
        assert_eq!(call.path(), "environment/environments/dev/analysis");
        assert_eq!(
            call.query,
            vec![
                ("projectName", "shop".to_string()),
                ("triggerName", "timer".to_string()),
                ("userName", "timer".to_string()),
                ("production", "false".to_string()),
            ]
        );
        assert_eq!(call.payload, None);

        let call = RemoteCall::for_trigger(&trigger(TriggerPayload::EnvSleep(EnvSleepArgs {
            env_name: "prod".to_string(),
            product_name: "shop".to_string(),
            production: true,
            action: SleepAction::Disable,
        })));
        assert_eq!(call.path(), "environment/environments/prod/sleep");
        assert_eq!(
            call.query,
            vec![
                ("projectName", "shop".to_string()),
                ("action", "disable".to_string()),
                ("production", "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_release_plan_call_uses_trigger_id() {
        let call = RemoteCall::for_trigger(&trigger(TriggerPayload::ReleasePlan(
            ReleasePlanArgs {
                id: "plan-7".to_string(),
                name: "spring".to_string(),
                index: 2,
            },
        )));
        assert_eq!(call.path(), "release_plan/v1/plan-7/schedule_execute");
        assert_eq!(call.query, vec![("jobID", "65f0c1".to_string())]);
    }

    #[test]
    fn test_names_stay_whole_segments_and_values() {
        let call = RemoteCall::for_trigger(&trigger(TriggerPayload::EnvSleep(EnvSleepArgs {
            env_name: "qa/blue #2".to_string(),
            product_name: "shop&co?".to_string(),
            production: false,
            action: SleepAction::Enable,
        })));

        assert_eq!(call.segments[2], "qa/blue #2");
        assert_eq!(call.query[0], ("projectName", "shop&co?".to_string()));
    }

    #[tokio::test]
    async fn test_fire_swallows_remote_failure() {
        let invoker = Arc::new(RecordingInvoker::failing());
        let firing = Firing::new(&trigger(TriggerPayload::Testing), invoker.clone());

        firing.fire().await;

        assert_eq!(invoker.paths(), vec!["testing/testtask".to_string()]);
    }
}

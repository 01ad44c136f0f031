//! Cronjob message handling
//!
//! The platform pushes one message per entity whose triggers changed.
//! Enabling replaces registrations; disabling stops every trigger of the
//! entity and then asks the platform to persist the disabled state.
//!
//! The two halves of a disable are separate calls. When the platform call
//! fails the local removals stand and the error is returned; the next full
//! resync reconciles the two sides.

use keel_core::dto::cronjob::{CronjobAction, CronjobMessage};
use std::sync::Arc;

use crate::engine::Engines;
use crate::error::{Result, SchedulerError};
use crate::platform::TriggerSource;

pub struct CronjobHandler {
    engines: Arc<Engines>,
    source: Arc<dyn TriggerSource>,
}

impl CronjobHandler {
    pub fn new(engines: Arc<Engines>, source: Arc<dyn TriggerSource>) -> Self {
        Self { engines, source }
    }

    /// Apply messages in order, stopping at the first failure
    pub async fn handle_messages(&self, messages: &[CronjobMessage]) -> Result<()> {
        for message in messages {
            if let Err(e) = self.handle_message(message).await {
                tracing::error!(
                    "Failed to {:?} triggers of {} ({}): {}",
                    message.action,
                    message.name,
                    message.kind,
                    e
                );
                return Err(e);
            }
        }
        Ok(())
    }

    pub async fn handle_message(&self, message: &CronjobMessage) -> Result<()> {
        match message.action {
            CronjobAction::Enable => self.enable(message).await,
            CronjobAction::Disable => self.disable(message).await,
        }
    }

    async fn enable(&self, message: &CronjobMessage) -> Result<()> {
        for id in &message.delete_list {
            tracing::info!("Stopping trigger {}", id);
            self.engines.remove(message.engine, id).await?;
        }

        for trigger in &message.triggers {
            self.engines.register(trigger).await?;
        }

        tracing::debug!(
            "Enabled {} trigger(s) of {} ({})",
            message.triggers.len(),
            message.name,
            message.kind
        );
        Ok(())
    }

    async fn disable(&self, message: &CronjobMessage) -> Result<()> {
        let triggers = self
            .source
            .list_triggers(message.kind, &message.name)
            .await
            .map_err(|e| SchedulerError::Fetch(format!("{:#}", e)))?;

        for trigger in &triggers {
            tracing::info!("Stopping trigger {}", trigger.id);
            self.engines.remove(message.engine, &trigger.id).await?;
        }

        if let Err(e) = self
            .source
            .disable_trigger(&message.name, message.kind)
            .await
        {
            tracing::error!(
                "Stopped {} trigger(s) of {} locally but the platform still has them enabled: {:#}",
                triggers.len(),
                message.name,
                e
            );
            return Err(SchedulerError::Disable {
                name: message.name.clone(),
                reason: format!("{:#}", e),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::*;
    use crate::platform::testing::{FakeSource, RecordingInvoker};
    use keel_core::domain::trigger::{EngineKind, Trigger, TriggerKind};

    fn message(action: CronjobAction, triggers: Vec<Trigger>, delete_list: &[&str]) -> CronjobMessage {
        CronjobMessage {
            name: "nightly".to_string(),
            product_name: "shop".to_string(),
            action,
            kind: TriggerKind::Workflow,
            engine: EngineKind::Recurring,
            triggers,
            delete_list: delete_list.iter().map(|id| id.to_string()).collect(),
        }
    }

    async fn handler(source: FakeSource) -> (CronjobHandler, Arc<Engines>, Arc<FakeSource>) {
        let engines = Arc::new(
            Engines::new(Arc::new(RecordingInvoker::default()))
                .await
                .unwrap(),
        );
        let source = Arc::new(source);
        (
            CronjobHandler::new(engines.clone(), source.clone()),
            engines,
            source,
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_enable_deletes_then_registers() {
        let (handler, engines, _) = handler(FakeSource::default()).await;
        engines
            .register(&recurring_trigger("old", "0 1 * * *"))
            .await
            .unwrap();

        handler
            .handle_message(&message(
                CronjobAction::Enable,
                vec![
                    recurring_trigger("a", "0 2 * * *"),
                    recurring_trigger("b", "0 3 * * *"),
                ],
                &["old", "never-registered"],
            ))
            .await
            .unwrap();

        assert_eq!(engines.registered().await.recurring, vec!["a", "b"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_enable_stops_at_bad_trigger() {
        let (handler, engines, _) = handler(FakeSource::default()).await;

        let err = handler
            .handle_messages(&[message(
                CronjobAction::Enable,
                vec![
                    recurring_trigger("a", "0 2 * * *"),
                    recurring_trigger("b", "nonsense"),
                ],
                &[],
            )])
            .await
            .unwrap_err();

        assert!(matches!(err, SchedulerError::Registration(_)));
        assert_eq!(engines.registered().await.recurring, vec!["a"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_disable_removes_and_persists() {
        let mut source = FakeSource::default();
        source.owned.insert(
            (TriggerKind::Workflow, "nightly".to_string()),
            vec![
                recurring_trigger("a", "0 2 * * *"),
                recurring_trigger("b", "0 3 * * *"),
            ],
        );
        let (handler, engines, source) = handler(source).await;
        for id in ["a", "b", "other"] {
            engines
                .register(&recurring_trigger(id, "0 2 * * *"))
                .await
                .unwrap();
        }

        handler
            .handle_message(&message(CronjobAction::Disable, vec![], &[]))
            .await
            .unwrap();

        assert_eq!(engines.registered().await.recurring, vec!["other"]);
        assert_eq!(
            *source.disabled.lock().unwrap(),
            vec![("nightly".to_string(), TriggerKind::Workflow)]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_remote_disable_keeps_local_removal() {
        let mut source = FakeSource {
            fail_disable: true,
            ..Default::default()
        };
        source.owned.insert(
            (TriggerKind::Workflow, "nightly".to_string()),
            vec![recurring_trigger("a", "0 2 * * *")],
        );
        let (handler, engines, _) = handler(source).await;
        engines
            .register(&recurring_trigger("a", "0 2 * * *"))
            .await
            .unwrap();

        let err = handler
            .handle_message(&message(CronjobAction::Disable, vec![], &[]))
            .await
            .unwrap_err();

        assert!(matches!(err, SchedulerError::Disable { .. }));
        assert!(engines.registered().await.recurring.is_empty());
    }
}

//! Platform collaborators
//!
//! The scheduler reads trigger state from the platform and calls back into
//! it when triggers fire. Both seams are traits so the handler and recovery
//! can run against fakes.

use anyhow::{Context, Result};
use async_trait::async_trait;
use keel_client::PlatformClient;
use keel_core::domain::trigger::{Trigger, TriggerKind};

use crate::action::RemoteCall;

/// Persisted trigger state
#[async_trait]
pub trait TriggerSource: Send + Sync {
    async fn list_enabled_triggers(&self) -> Result<Vec<Trigger>>;

    async fn list_failsafe_triggers(&self) -> Result<Vec<Trigger>>;

    /// Triggers owned by one entity
    async fn list_triggers(&self, kind: TriggerKind, name: &str) -> Result<Vec<Trigger>>;

    /// Persist the disabled state of an entity's triggers
    async fn disable_trigger(&self, name: &str, kind: TriggerKind) -> Result<()>;
}

/// Remote trigger collaborator
#[async_trait]
pub trait ActionInvoker: Send + Sync {
    async fn invoke_remote_action(&self, call: &RemoteCall) -> Result<()>;
}

#[async_trait]
impl TriggerSource for PlatformClient {
    async fn list_enabled_triggers(&self) -> Result<Vec<Trigger>> {
        PlatformClient::list_enabled_triggers(self)
            .await
            .context("Failed to list enabled triggers")
    }

    async fn list_failsafe_triggers(&self) -> Result<Vec<Trigger>> {
        PlatformClient::list_failsafe_triggers(self)
            .await
            .context("Failed to list failsafe triggers")
    }

    async fn list_triggers(&self, kind: TriggerKind, name: &str) -> Result<Vec<Trigger>> {
        PlatformClient::list_triggers(self, kind, name)
            .await
            .with_context(|| format!("Failed to list {} triggers of {}", kind, name))
    }

    async fn disable_trigger(&self, name: &str, kind: TriggerKind) -> Result<()> {
        PlatformClient::disable_trigger(self, name, kind)
            .await
            .with_context(|| format!("Failed to disable {} triggers of {}", kind, name))
    }
}

#[async_trait]
impl ActionInvoker for PlatformClient {
    async fn invoke_remote_action(&self, call: &RemoteCall) -> Result<()> {
        PlatformClient::invoke_remote_action(
            self,
            call.segments.as_slice(),
            &call.query,
            call.payload.as_ref(),
        )
        .await
        .with_context(|| format!("POST {} failed", call.path()))
    }
}

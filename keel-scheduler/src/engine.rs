//! Scheduling engines
//!
//! Two independent engines, each wrapping one `JobScheduler`:
//! - `RecurringEngine`: cron expressions
//! - `OneShotEngine`: absolute instants
//!
//! Both keep a registry from trigger ID to the scheduler's job UUID so that
//! registering an ID again replaces the previous job, and removal works by
//! trigger ID. `Engines` owns the pair and routes a trigger to the right one.

use chrono::{DateTime, Utc};
use keel_core::domain::trigger::{EngineKind, Trigger};
use keel_core::dto::cronjob::RegisteredTriggers;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::action::Firing;
use crate::error::{RegistrationError, Result, SchedulerError};
use crate::platform::ActionInvoker;
use crate::schedule::cron_expression;

/// How late a one-shot trigger may be and still fire
pub const GRACE_WINDOW: Duration = Duration::from_secs(30);

type Registry = Arc<Mutex<HashMap<String, Uuid>>>;

fn engine_error(e: impl std::fmt::Debug) -> SchedulerError {
    SchedulerError::Engine(format!("{:?}", e))
}

async fn new_scheduler() -> Result<JobScheduler> {
    JobScheduler::new().await.map_err(engine_error)
}

async fn shutdown(scheduler: &JobScheduler) -> Result<()> {
    let mut scheduler = scheduler.clone();
    scheduler.shutdown().await.map_err(engine_error)
}

/// Remove the job registered under `id`, if any
async fn remove_from(scheduler: &JobScheduler, jobs: &mut HashMap<String, Uuid>, id: &str) -> Result<bool> {
    match jobs.remove(id) {
        Some(uuid) => {
            scheduler.remove(&uuid).await.map_err(engine_error)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

fn sorted_ids(jobs: &HashMap<String, Uuid>) -> Vec<String> {
    let mut ids: Vec<String> = jobs.keys().cloned().collect();
    ids.sort();
    ids
}

// =============================================================================
// Recurring Engine
// =============================================================================

pub struct RecurringEngine {
    scheduler: JobScheduler,
    jobs: Registry,
}

impl RecurringEngine {
    pub async fn new() -> Result<Self> {
        Ok(Self {
            scheduler: new_scheduler().await?,
            jobs: Registry::default(),
        })
    }

    pub async fn start(&self) -> Result<()> {
        self.scheduler.start().await.map_err(engine_error)
    }

    pub async fn stop(&self) -> Result<()> {
        shutdown(&self.scheduler).await
    }

    /// Register `firing` under `id`, replacing any earlier registration
    ///
    /// # Arguments
    /// * `id` - Trigger ID
    /// * `cron` - Six-field cron expression
    /// * `firing` - Action run on every tick
    pub async fn register(
        &self,
        id: &str,
        cron: &str,
        firing: Arc<Firing>,
    ) -> std::result::Result<(), RegistrationError> {
        let job = Job::new_async(cron, move |_uuid, _scheduler| {
            let firing = firing.clone();
            Box::pin(async move {
                firing.fire().await;
            })
        })
        .map_err(|e| RegistrationError::invalid(id, format!("cron '{}': {:?}", cron, e)))?;

        let mut jobs = self.jobs.lock().await;
        remove_from(&self.scheduler, &mut jobs, id)
            .await
            .map_err(|e| RegistrationError::Engine {
                id: id.to_string(),
                reason: e.to_string(),
            })?;

        let uuid = self
            .scheduler
            .add(job)
            .await
            .map_err(|e| RegistrationError::Engine {
                id: id.to_string(),
                reason: format!("{:?}", e),
            })?;
        jobs.insert(id.to_string(), uuid);

        tracing::info!("Registered trigger {} with cron '{}'", id, cron);
        Ok(())
    }

    /// Remove a registration; unknown IDs are a no-op
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let mut jobs = self.jobs.lock().await;
        remove_from(&self.scheduler, &mut jobs, id).await
    }

    pub async fn registered(&self) -> Vec<String> {
        sorted_ids(&*self.jobs.lock().await)
    }
}

// =============================================================================
// One-Shot Engine
// =============================================================================

/// Result of registering a one-shot trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneShotOutcome {
    Scheduled,
    /// Late within the grace window
    FiredImmediately,
    /// Too late; not executed
    Dropped,
}

#[derive(Debug, PartialEq)]
enum Timing {
    Future(Duration),
    Late(Duration),
    Expired(Duration),
}

fn timing(at: DateTime<Utc>, now: DateTime<Utc>) -> Timing {
    if at > now {
        return Timing::Future((at - now).to_std().unwrap_or_default());
    }

    let late = (now - at).to_std().unwrap_or_default();
    if late <= GRACE_WINDOW {
        Timing::Late(late)
    } else {
        Timing::Expired(late)
    }
}

pub struct OneShotEngine {
    scheduler: JobScheduler,
    jobs: Registry,
}

impl OneShotEngine {
    pub async fn new() -> Result<Self> {
        Ok(Self {
            scheduler: new_scheduler().await?,
            jobs: Registry::default(),
        })
    }

    pub async fn start(&self) -> Result<()> {
        self.scheduler.start().await.map_err(engine_error)
    }

    pub async fn stop(&self) -> Result<()> {
        shutdown(&self.scheduler).await
    }

    /// Schedule `firing` at `at`, replacing any earlier registration of `id`
    pub async fn register(
        &self,
        id: &str,
        at: DateTime<Utc>,
        firing: Arc<Firing>,
    ) -> std::result::Result<OneShotOutcome, RegistrationError> {
        self.register_at(id, at, Utc::now(), firing).await
    }

    async fn register_at(
        &self,
        id: &str,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
        firing: Arc<Firing>,
    ) -> std::result::Result<OneShotOutcome, RegistrationError> {
        let engine_failure = |e: SchedulerError| RegistrationError::Engine {
            id: id.to_string(),
            reason: e.to_string(),
        };

        let mut jobs = self.jobs.lock().await;
        remove_from(&self.scheduler, &mut jobs, id)
            .await
            .map_err(engine_failure)?;

        let delay = match timing(at, now) {
            Timing::Future(delay) => delay,
            Timing::Late(late) => {
                tracing::info!(
                    "Trigger {} is {:?} late (scheduled {}), firing now",
                    id,
                    late,
                    at
                );
                tokio::spawn(async move {
                    firing.fire().await;
                });
                return Ok(OneShotOutcome::FiredImmediately);
            }
            Timing::Expired(late) => {
                tracing::warn!(
                    "Trigger {} is {:?} late (scheduled {}), dropping it",
                    id,
                    late,
                    at
                );
                return Ok(OneShotOutcome::Dropped);
            }
        };

        let registry = self.jobs.clone();
        let trigger_id = id.to_string();
        let job = Job::new_one_shot_async(delay, move |uuid, _scheduler| {
            let firing = firing.clone();
            let registry = registry.clone();
            let trigger_id = trigger_id.clone();
            Box::pin(async move {
                {
                    let mut jobs = registry.lock().await;
                    if jobs.get(&trigger_id) == Some(&uuid) {
                        jobs.remove(&trigger_id);
                    }
                }
                firing.fire().await;
            })
        })
        .map_err(|e| RegistrationError::invalid(id, format!("{:?}", e)))?;

        let uuid = self
            .scheduler
            .add(job)
            .await
            .map_err(|e| RegistrationError::Engine {
                id: id.to_string(),
                reason: format!("{:?}", e),
            })?;
        jobs.insert(id.to_string(), uuid);

        tracing::info!("Registered one-shot trigger {} at {}", id, at);
        Ok(OneShotOutcome::Scheduled)
    }

    /// Remove a pending registration; unknown or fired IDs are a no-op
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let mut jobs = self.jobs.lock().await;
        remove_from(&self.scheduler, &mut jobs, id).await
    }

    pub async fn registered(&self) -> Vec<String> {
        sorted_ids(&*self.jobs.lock().await)
    }
}

// =============================================================================
// Engine Pair
// =============================================================================

/// The recurring and one-shot engines plus the action collaborator their
/// triggers call
pub struct Engines {
    pub recurring: RecurringEngine,
    pub one_shot: OneShotEngine,
    invoker: Arc<dyn ActionInvoker>,
}

impl Engines {
    pub async fn new(invoker: Arc<dyn ActionInvoker>) -> Result<Self> {
        Ok(Self {
            recurring: RecurringEngine::new().await?,
            one_shot: OneShotEngine::new().await?,
            invoker,
        })
    }

    pub async fn start(&self) -> Result<()> {
        self.recurring.start().await?;
        self.one_shot.start().await?;
        tracing::info!("Scheduling engines started");
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        self.recurring.stop().await?;
        self.one_shot.stop().await?;
        tracing::info!("Scheduling engines stopped");
        Ok(())
    }

    /// Register a trigger in the engine its schedule belongs to
    ///
    /// A disabled trigger is removed instead.
    pub async fn register(&self, trigger: &Trigger) -> std::result::Result<(), RegistrationError> {
        let engine = trigger.schedule.engine();

        if !trigger.enabled {
            tracing::debug!("Trigger {} is disabled, removing it", trigger.id);
            return self
                .remove(engine, &trigger.id)
                .await
                .map(|_| ())
                .map_err(|e| RegistrationError::Engine {
                    id: trigger.id.clone(),
                    reason: e.to_string(),
                });
        }

        let firing = Arc::new(Firing::new(trigger, self.invoker.clone()));
        match engine {
            EngineKind::Recurring => {
                let cron = cron_expression(&trigger.id, &trigger.schedule)?;
                self.recurring.register(&trigger.id, &cron, firing).await
            }
            EngineKind::OneShot => {
                let at = trigger.schedule.instant().ok_or_else(|| {
                    RegistrationError::invalid(&trigger.id, "instant out of range")
                })?;
                self.one_shot.register(&trigger.id, at, firing).await.map(|_| ())
            }
        }
    }

    /// Remove a trigger ID from one engine
    pub async fn remove(&self, engine: EngineKind, id: &str) -> Result<bool> {
        match engine {
            EngineKind::Recurring => self.recurring.remove(id).await,
            EngineKind::OneShot => self.one_shot.remove(id).await,
        }
    }

    pub async fn registered(&self) -> RegisteredTriggers {
        RegisteredTriggers {
            recurring: self.recurring.registered().await,
            one_shot: self.one_shot.registered().await,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use keel_core::domain::trigger::{Schedule, Trigger, TriggerPayload};

    pub fn recurring_trigger(id: &str, cron: &str) -> Trigger {
        Trigger {
            id: id.to_string(),
            name: format!("wf-{}", id),
            product_name: "shop".to_string(),
            enabled: true,
            schedule: Schedule::Crontab {
                cron: cron.to_string(),
            },
            payload: TriggerPayload::Workflow(serde_json::json!({ "name": id })),
        }
    }

    pub fn one_shot_trigger(id: &str, unix_stamp: i64) -> Trigger {
        Trigger {
            id: id.to_string(),
            name: format!("plan-{}", id),
            product_name: "shop".to_string(),
            enabled: true,
            schedule: Schedule::UnixStamp { unix_stamp },
            payload: TriggerPayload::ReleasePlan(keel_core::domain::trigger::ReleasePlanArgs {
                id: format!("plan-{}", id),
                name: "spring".to_string(),
                index: 0,
            }),
        }
    }
}

//! # Side-Effect Dispatcher
//!
//! Step completions that need network work enqueue a [`SideEffect`] on a
//! bounded channel. One worker task drains it, running each effect on its
//! own task so a slow website fetch does not hold up a user upsert.
//!
//! Effects are fire-and-forget. Enqueueing never blocks a request; a full
//! queue, a failed effect, or a panicked effect task is logged and counted
//! in `intake_side_effect_failures_total`. Nothing is retried and nothing
//! reaches the applicant.
//!
//! | Completed step         | Effect        |
//! |------------------------|---------------|
//! | `personal-information` | `UpsertUser`  |
//! | `business-website`     | `WebsiteCheck`|

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use intake_compliance::{WebsiteCheckError, WebsiteCheckRequest, WebsiteCheckService};
use intake_core::{ApplicationId, FieldMap, FieldValue, SessionId};

use crate::db::{IntakeRepository, PersistenceError};
use crate::middleware::metrics::ApiMetrics;
use crate::records::UserInput;
use crate::session::SessionRegistry;

/// Pending effects beyond this are dropped.
pub const QUEUE_CAPACITY: usize = 256;

const PERSONAL_INFORMATION_STEP: &str = "personal-information";
const BUSINESS_WEBSITE_STEP: &str = "business-website";

/// Work triggered by a step completion.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    /// Save the applicant and link them to the application.
    UpsertUser {
        session_id: SessionId,
        application_id: ApplicationId,
        fields: FieldMap,
    },
    /// Score the business website.
    WebsiteCheck {
        application_id: ApplicationId,
        business_website: String,
        business_name: Option<String>,
    },
}

impl SideEffect {
    /// Metric label.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UpsertUser { .. } => "upsert_user",
            Self::WebsiteCheck { .. } => "website_check",
        }
    }
}

/// The effect for a just-completed step, if it has one.
pub fn side_effect_for(
    completed_step: &str,
    session_id: SessionId,
    application_id: ApplicationId,
    fields: &FieldMap,
) -> Option<SideEffect> {
    let text = |name: &str| {
        fields
            .get(name)
            .filter(|v| !v.is_empty())
            .map(FieldValue::to_storage_string)
    };
    match completed_step {
        PERSONAL_INFORMATION_STEP => Some(SideEffect::UpsertUser {
            session_id,
            application_id,
            fields: fields.clone(),
        }),
        BUSINESS_WEBSITE_STEP => Some(SideEffect::WebsiteCheck {
            application_id,
            business_website: text("businessWebsite")?,
            business_name: text("businessName"),
        }),
        _ => None,
    }
}

/// Why an effect did not happen.
#[derive(Error, Debug)]
pub enum SideEffectError {
    #[error("applicant data is unusable: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    WebsiteCheck(#[from] WebsiteCheckError),

    #[error("side-effect queue is full")]
    QueueFull,

    #[error("dispatcher has shut down")]
    Closed,
}

/// What effects run against.
#[derive(Clone)]
pub struct EffectContext {
    pub repository: Arc<dyn IntakeRepository>,
    pub website_checks: WebsiteCheckService,
    pub sessions: SessionRegistry,
    pub metrics: ApiMetrics,
}

impl EffectContext {
    async fn execute(&self, effect: SideEffect) -> Result<(), SideEffectError> {
        match effect {
            SideEffect::UpsertUser {
                session_id,
                application_id,
                fields,
            } => {
                let profile = UserInput::from_fields(&fields)
                    .map_err(|e| SideEffectError::InvalidInput(e.to_string()))?;
                let user = self.repository.upsert_user(profile).await?;
                self.repository.link_user(user.id, application_id).await?;
                if let Some(session) = self.sessions.get(session_id) {
                    session.lock().await.set_user_id(user.id).await;
                }
                tracing::info!(
                    user_id = %user.id,
                    application_id = %application_id,
                    "applicant saved"
                );
                Ok(())
            }
            SideEffect::WebsiteCheck {
                application_id,
                business_website,
                business_name,
            } => {
                let outcome = self
                    .website_checks
                    .run(&WebsiteCheckRequest {
                        business_website,
                        business_name,
                        application_id,
                    })
                    .await?;
                self.metrics
                    .record_website_check(outcome.check.status.as_str());
                Ok(())
            }
        }
    }
}

/// Handle to the effect queue. Clones share the queue.
#[derive(Clone)]
pub struct Dispatcher {
    sender: Arc<Mutex<Option<mpsc::Sender<SideEffect>>>>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
    metrics: ApiMetrics,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("open", &self.sender.lock().is_some())
            .finish()
    }
}

impl Dispatcher {
    /// Spawn the worker. Must be called inside a Tokio runtime.
    pub fn spawn(context: EffectContext) -> Self {
        Self::with_capacity(context, QUEUE_CAPACITY)
    }

    pub fn with_capacity(context: EffectContext, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        let metrics = context.metrics.clone();
        let worker = tokio::spawn(run_worker(context, rx));
        Self {
            sender: Arc::new(Mutex::new(Some(tx))),
            worker: Arc::new(Mutex::new(Some(worker))),
            metrics,
        }
    }

    /// Queue an effect without waiting. Failure is logged and counted.
    pub fn enqueue(&self, effect: SideEffect) {
        let name = effect.name();
        if let Err(e) = self.try_enqueue(effect) {
            tracing::warn!(effect = name, error = %e, "side effect dropped");
            self.metrics.record_side_effect_failure(name);
        }
    }

    fn try_enqueue(&self, effect: SideEffect) -> Result<(), SideEffectError> {
        let guard = self.sender.lock();
        let tx = guard.as_ref().ok_or(SideEffectError::Closed)?;
        tx.try_send(effect).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SideEffectError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SideEffectError::Closed,
        })
    }

    /// Close the queue and wait for every queued and running effect.
    pub async fn drain(&self) {
        self.sender.lock().take();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "side-effect worker panicked");
            }
        }
    }
}

async fn run_worker(context: EffectContext, mut rx: mpsc::Receiver<SideEffect>) {
    let mut running = JoinSet::new();
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(effect) => {
                    let context = context.clone();
                    running.spawn(async move {
                        let name = effect.name();
                        match context.execute(effect).await {
                            Ok(()) => context.metrics.record_side_effect(name),
                            Err(e) => {
                                tracing::warn!(effect = name, error = %e, "side effect failed");
                                context.metrics.record_side_effect_failure(name);
                            }
                        }
                    });
                }
                None => break,
            },
            Some(joined) = running.join_next(), if !running.is_empty() => {
                log_join(joined, &context.metrics);
            }
        }
    }
    while let Some(joined) = running.join_next().await {
        log_join(joined, &context.metrics);
    }
    tracing::debug!("side-effect worker stopped");
}

fn log_join(joined: Result<(), tokio::task::JoinError>, metrics: &ApiMetrics) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "side-effect task panicked");
        metrics.record_side_effect_failure("panicked");
    }
}

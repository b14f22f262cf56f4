//! # Wizard Sessions
//!
//! A [`WizardSession`] owns one applicant's [`FormStore`]. Sessions live in
//! the [`SessionRegistry`], each behind its own async mutex: requests for the
//! same session are serialized, different sessions never contend.
//!
//! Advancing is transactional. The navigator runs on a clone of the state,
//! the resulting draft is persisted, and only then is the clone committed to
//! the store. A persistence failure therefore leaves the session exactly as
//! it was and the applicant can retry.
//!
//! The registry only holds sessions in use. Submitted sessions are closed by
//! the advance route, and sessions idle past the configured timeout are
//! evicted by a periodic sweep. Evicting a session drops its in-memory
//! snapshot; directory snapshots stay on disk for a later resume.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use utoipa::ToSchema;

use intake_core::{ApplicationId, FieldMap, SessionId, Timestamp, UserId};
use intake_state::{
    AdvanceOutcome, FileSnapshotStore, FormStore, MemorySnapshotStore, NavigationEvent,
    Navigator, SnapshotError, SnapshotStore, StepRegistry,
};

use crate::db::{IntakeRepository, PersistenceError};
use crate::dispatcher::{side_effect_for, SideEffect};
use crate::error::AppError;
use crate::records::{ApplicationDraft, ApplicationRecord};

// ─── Snapshot backend ────────────────────────────────────────────────

/// Where session snapshots are kept.
#[derive(Debug, Clone)]
pub enum SnapshotBackend {
    /// Process memory, one map per session id.
    Memory(Arc<DashMap<SessionId, MemorySnapshotStore>>),
    /// One directory per session under a root.
    Directory(PathBuf),
}

impl SnapshotBackend {
    pub fn memory() -> Self {
        Self::Memory(Arc::new(DashMap::new()))
    }

    async fn open(&self, id: SessionId) -> Result<Box<dyn SnapshotStore>, SnapshotError> {
        match self {
            Self::Memory(stores) => Ok(Box::new(stores.entry(id).or_default().value().clone())),
            Self::Directory(root) => Ok(Box::new(
                FileSnapshotStore::open(root.join(id.to_string())).await?,
            )),
        }
    }

    /// Drop the in-memory snapshot of a closed session.
    fn forget(&self, id: SessionId) {
        if let Self::Memory(stores) = self {
            stores.remove(&id);
        }
    }
}

// ─── Session ─────────────────────────────────────────────────────────

/// One applicant's wizard.
#[derive(Debug)]
pub struct WizardSession {
    id: SessionId,
    store: FormStore,
    created_at: Timestamp,
    updated_at: Timestamp,
}

/// Result of a successful advance.
#[derive(Debug)]
pub struct Advanced {
    pub event: NavigationEvent,
    pub record: ApplicationRecord,
    /// Work to hand to the dispatcher, if the completed step has any.
    pub side_effect: Option<SideEffect>,
}

impl WizardSession {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn store(&self) -> &FormStore {
        &self.store
    }

    /// Merge field values. Unknown names reject the whole batch.
    pub async fn set_fields(&mut self, fields: FieldMap) -> Result<(), AppError> {
        self.store.set_fields(fields).await?;
        self.touch();
        Ok(())
    }

    /// Validate the current step, persist, then move forward.
    ///
    /// Completing the terminal step submits the application and marks the
    /// form complete.
    pub async fn advance(&mut self, repo: &dyn IntakeRepository) -> Result<Advanced, AppError> {
        let registry = Arc::clone(self.store.registry());
        let mut next = self.store.state().clone();
        let mut navigator = Navigator::new(&registry, &mut next);

        let (event, completed_step, submit) = match navigator.advance()? {
            AdvanceOutcome::Moved(change) => {
                let from = change.from.clone();
                (NavigationEvent::StepChanged(change), from, false)
            }
            AdvanceOutcome::AwaitingSubmission { step } => {
                let completion = navigator.complete()?;
                (NavigationEvent::Completed(completion), step, true)
            }
        };

        let mut draft = ApplicationDraft::from_form(&next);
        if submit {
            draft = draft.submitted();
        }
        let record = self.persist(repo, draft).await?;

        let side_effect = side_effect_for(&completed_step, self.id, record.id, &next.fields);
        self.store.commit(next).await?;
        if self.store.application_id() != Some(record.id) {
            self.store.set_application_id(record.id).await;
        }
        if submit {
            self.store.record_submission().await;
        }
        self.touch();

        tracing::info!(
            session_id = %self.id,
            application_id = %record.id,
            completed_step = %completed_step,
            current_step = %self.store.state().current_step_id,
            submitted = submit,
            "step completed"
        );

        Ok(Advanced {
            event,
            record,
            side_effect,
        })
    }

    async fn persist(
        &self,
        repo: &dyn IntakeRepository,
        draft: ApplicationDraft,
    ) -> Result<ApplicationRecord, PersistenceError> {
        match self.store.application_id() {
            Some(id) => match repo.update_application(id, draft.clone()).await {
                Err(PersistenceError::NotFound { .. }) => {
                    tracing::warn!(
                        session_id = %self.id,
                        application_id = %id,
                        "snapshot references a missing application, creating a new one"
                    );
                    repo.create_application(draft).await
                }
                other => other,
            },
            None => repo.create_application(draft).await,
        }
    }

    /// Step back one. Allowed until submission; `None` at the first step.
    pub async fn go_back(&mut self) -> Result<Option<NavigationEvent>, AppError> {
        let registry = Arc::clone(self.store.registry());
        let mut next = self.store.state().clone();
        let change = Navigator::new(&registry, &mut next).go_back()?;
        if change.is_some() {
            self.store.commit(next).await?;
            self.touch();
        }
        Ok(change.map(NavigationEvent::StepChanged))
    }

    /// Jump to a completed step or the next reachable one.
    pub async fn jump_to(&mut self, target: &str) -> Result<Option<NavigationEvent>, AppError> {
        let registry = Arc::clone(self.store.registry());
        let mut next = self.store.state().clone();
        let change = Navigator::new(&registry, &mut next).jump_to(target)?;
        if change.is_some() {
            self.store.commit(next).await?;
            self.touch();
        }
        Ok(change.map(NavigationEvent::StepChanged))
    }

    /// Start over. Clears the snapshot, including the application id.
    pub async fn reset(&mut self) {
        self.store.reset().await;
        self.touch();
        tracing::info!(session_id = %self.id, "session reset");
    }

    /// Record the applicant id found by the user upsert.
    pub async fn set_user_id(&mut self, id: UserId) {
        self.store.set_user_id(id).await;
        self.touch();
    }

    /// The API representation.
    pub fn view(&self, application_version: &str, event: Option<NavigationEvent>) -> SessionView {
        let state = self.store.state();
        let registry = self.store.registry();
        let mut scratch = state.clone();
        let navigator = Navigator::new(registry, &mut scratch);
        let mut reachable: Vec<String> = registry
            .ordered_steps()
            .iter()
            .filter(|s| navigator.can_jump_to(&s.id).unwrap_or(false))
            .map(|s| s.id.clone())
            .collect();
        if !reachable.contains(&state.current_step_id) {
            reachable.push(state.current_step_id.clone());
        }
        SessionView {
            session_id: self.id,
            application_version: application_version.to_string(),
            current_step_id: state.current_step_id.clone(),
            fields: state.fields.clone(),
            completed_steps: state.completed_steps.iter().cloned().collect(),
            reachable_steps: reachable,
            can_go_back: registry
                .previous_step_id(&state.current_step_id)
                .map(|p| p.is_some())
                .unwrap_or(false),
            complete: state.complete,
            application_id: self.store.application_id(),
            user_id: self.store.user_id(),
            submission_succeeded: self.store.submission_succeeded(),
            event,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Timestamp::now();
    }
}

/// Session state as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    #[schema(value_type = String, format = Uuid)]
    pub session_id: SessionId,
    pub application_version: String,
    pub current_step_id: String,
    #[schema(value_type = Object)]
    pub fields: FieldMap,
    pub completed_steps: Vec<String>,
    /// Steps the applicant may jump to, in order.
    pub reachable_steps: Vec<String>,
    pub can_go_back: bool,
    pub complete: bool,
    #[schema(value_type = Option<String>, format = Uuid)]
    pub application_id: Option<ApplicationId>,
    #[schema(value_type = Option<String>, format = Uuid)]
    pub user_id: Option<UserId>,
    pub submission_succeeded: bool,
    /// The transition this request caused, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub event: Option<NavigationEvent>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: Timestamp,
}

// ─── Registry ────────────────────────────────────────────────────────

/// Shared handle to one session.
pub type SessionHandle = Arc<Mutex<WizardSession>>;

#[derive(Debug)]
struct Entry {
    handle: SessionHandle,
    last_seen: Instant,
}

/// All live sessions.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<SessionId, Entry>>,
    registry: Arc<StepRegistry>,
    backend: SnapshotBackend,
}

impl SessionRegistry {
    pub fn new(registry: Arc<StepRegistry>, backend: SnapshotBackend) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            registry,
            backend,
        }
    }

    /// Return the live session `id`, or open it from its snapshot. A new id
    /// is generated when none is given.
    pub async fn open(&self, id: Option<SessionId>) -> Result<SessionHandle, AppError> {
        let id = id.unwrap_or_default();
        if let Some(existing) = self.get(id) {
            return Ok(existing);
        }

        let snapshot = self.backend.open(id).await.map_err(|e| {
            AppError::Internal(format!("cannot open snapshot for session {id}: {e}"))
        })?;
        let store = FormStore::open(Arc::clone(&self.registry), snapshot).await;
        let now = Timestamp::now();
        tracing::info!(
            session_id = %id,
            current_step = %store.state().current_step_id,
            submitted = store.submission_succeeded(),
            "session opened"
        );
        let session = WizardSession {
            id,
            store,
            created_at: now,
            updated_at: now,
        };
        Ok(self
            .sessions
            .entry(id)
            .or_insert_with(|| Entry {
                handle: Arc::new(Mutex::new(session)),
                last_seen: Instant::now(),
            })
            .handle
            .clone())
    }

    /// A live session. Counts as activity for idle eviction.
    pub fn get(&self, id: SessionId) -> Option<SessionHandle> {
        self.sessions.get_mut(&id).map(|mut entry| {
            entry.last_seen = Instant::now();
            entry.handle.clone()
        })
    }

    /// Like [`Self::get`], but a missing session is a 404.
    pub fn require(&self, id: SessionId) -> Result<SessionHandle, AppError> {
        self.get(id)
            .ok_or_else(|| AppError::NotFound(format!("session {id} not found")))
    }

    /// Close a session. Returns whether it was live.
    pub fn remove(&self, id: SessionId) -> bool {
        let removed = self.sessions.remove(&id).is_some();
        self.backend.forget(id);
        if removed {
            tracing::info!(session_id = %id, "session closed");
        }
        removed
    }

    /// Close every session not seen for `max_idle`. Sessions locked by a
    /// request in flight are kept. Returns the closed ids.
    pub fn evict_idle(&self, max_idle: Duration) -> Vec<SessionId> {
        let now = Instant::now();
        let mut evicted = Vec::new();
        self.sessions.retain(|id, entry| {
            let idle = now.saturating_duration_since(entry.last_seen) >= max_idle;
            let keep = !idle || entry.handle.try_lock().is_err();
            if !keep {
                evicted.push(*id);
            }
            keep
        });
        for id in &evicted {
            self.backend.forget(*id);
        }
        if !evicted.is_empty() {
            tracing::info!(count = evicted.len(), "evicted idle sessions");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

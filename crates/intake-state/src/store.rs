//! # Application State Store
//!
//! [`ApplicationFormState`] is the in-progress form: field values, the
//! current step, and the set of completed steps. Its methods are pure.
//!
//! [`FormStore`] owns one session's state together with its
//! [`SnapshotStore`] and writes the full snapshot after every mutation.
//! Snapshot failures are logged and do not fail the mutation: losing the
//! client copy degrades resume-after-restart, it does not corrupt the form.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use intake_core::{ApplicationId, FieldMap, FieldValue, UserId};

use crate::navigation::TransitionRecord;
use crate::registry::{RegistryError, StepRegistry};
use crate::snapshot::{
    self, ClientSnapshot, SnapshotStore, APPLICATION_ID_KEY, FORM_DATA_KEY,
    SUBMISSION_SUCCESS_KEY, USER_ID_KEY,
};

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors from form mutations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No step collects a field with this name.
    #[error("unknown field: {name}")]
    UnknownField {
        /// The rejected field name.
        name: String,
    },

    /// The form was submitted; it accepts no changes until reset.
    #[error("application was already submitted")]
    AlreadySubmitted,

    /// A step id was not found in the registry.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// ─── Form State ──────────────────────────────────────────────────────

/// The in-progress application form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationFormState {
    /// Field name → value.
    pub fields: FieldMap,
    /// The step the applicant is on. Always a registered step id.
    pub current_step_id: String,
    /// Steps whose required fields were validated on the way forward.
    pub completed_steps: BTreeSet<String>,
    /// Set once the terminal step has been completed and persisted.
    #[serde(default)]
    pub complete: bool,
    /// Ordered log of every navigation transition.
    #[serde(default)]
    pub transitions: Vec<TransitionRecord>,
}

impl ApplicationFormState {
    /// A fresh form on the registry's first step.
    pub fn new(registry: &StepRegistry) -> Self {
        Self {
            fields: FieldMap::new(),
            current_step_id: registry.first_step().id.clone(),
            completed_steps: BTreeSet::new(),
            complete: false,
            transitions: Vec::new(),
        }
    }

    /// What is left after a successful final submission: parked on the
    /// terminal step with every step completed and no field values.
    pub fn submitted(registry: &StepRegistry) -> Self {
        Self {
            fields: FieldMap::new(),
            current_step_id: registry.terminal_step().id.clone(),
            completed_steps: registry
                .ordered_steps()
                .iter()
                .map(|s| s.id.clone())
                .collect(),
            complete: true,
            transitions: Vec::new(),
        }
    }

    /// Set a field. Only names some step collects are accepted.
    pub fn set_field(
        &mut self,
        registry: &StepRegistry,
        name: &str,
        value: FieldValue,
    ) -> Result<(), StoreError> {
        if !registry.is_known_field(name) {
            return Err(StoreError::UnknownField {
                name: name.to_string(),
            });
        }
        self.fields.insert(name.to_string(), value);
        Ok(())
    }

    /// Text value of a field, trimmed, if present and non-empty.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(FieldValue::as_text)
            .filter(|s| !s.is_empty())
    }

    /// Required fields of `step_id` that are absent or empty, in name order.
    pub fn missing_fields(
        &self,
        registry: &StepRegistry,
        step_id: &str,
    ) -> Result<Vec<String>, RegistryError> {
        let step = registry.get_step(step_id)?;
        Ok(step
            .required_fields
            .iter()
            .filter(|name| self.fields.get(*name).map_or(true, FieldValue::is_empty))
            .cloned()
            .collect())
    }

    /// True iff every required field of `step_id` is present and non-empty.
    pub fn validate_step(
        &self,
        registry: &StepRegistry,
        step_id: &str,
    ) -> Result<bool, RegistryError> {
        Ok(self.missing_fields(registry, step_id)?.is_empty())
    }

    /// Record a step as completed. Idempotent; returns whether it was new.
    pub fn mark_step_completed(
        &mut self,
        registry: &StepRegistry,
        step_id: &str,
    ) -> Result<bool, RegistryError> {
        registry.get_step(step_id)?;
        Ok(self.completed_steps.insert(step_id.to_string()))
    }

    /// Whether a step is completed.
    pub fn is_completed(&self, step_id: &str) -> bool {
        self.completed_steps.contains(step_id)
    }

    /// Clear everything and return to the first step.
    pub fn reset(&mut self, registry: &StepRegistry) {
        *self = Self::new(registry);
    }

    /// Whether the state is coherent with `registry`: the current step and
    /// every completed step are registered.
    pub fn is_consistent_with(&self, registry: &StepRegistry) -> bool {
        registry.contains(&self.current_step_id)
            && self.completed_steps.iter().all(|s| registry.contains(s))
    }
}

// ─── Form Store ──────────────────────────────────────────────────────

/// One session's form state bound to its snapshot storage.
///
/// After a successful submission the field values are dropped, in memory
/// and in the snapshot, and every mutation is rejected with
/// [`StoreError::AlreadySubmitted`] until [`FormStore::reset`].
#[derive(Debug)]
pub struct FormStore {
    registry: Arc<StepRegistry>,
    state: ApplicationFormState,
    snapshot: Box<dyn SnapshotStore>,
    application_id: Option<ApplicationId>,
    user_id: Option<UserId>,
    submission_succeeded: bool,
}

impl FormStore {
    /// Open a store, resuming from the snapshot when one exists.
    ///
    /// A snapshot that cannot be read, or whose steps are not in `registry`,
    /// is discarded and a fresh form is started. A snapshot of a submitted
    /// form resumes as submitted.
    pub async fn open(registry: Arc<StepRegistry>, snapshot: Box<dyn SnapshotStore>) -> Self {
        let loaded = match ClientSnapshot::load(snapshot.as_ref()).await {
            Ok(snap) => snap,
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable form snapshot");
                ClientSnapshot::default()
            }
        };

        let state = match loaded.form {
            _ if loaded.submission_succeeded => ApplicationFormState::submitted(&registry),
            Some(form) if form.is_consistent_with(&registry) => form,
            Some(form) => {
                tracing::warn!(
                    current_step = %form.current_step_id,
                    "snapshot references unregistered steps, starting fresh"
                );
                ApplicationFormState::new(&registry)
            }
            None => ApplicationFormState::new(&registry),
        };

        Self {
            state,
            registry,
            snapshot,
            application_id: loaded.application_id,
            user_id: loaded.user_id,
            submission_succeeded: loaded.submission_succeeded,
        }
    }

    /// The registry this store validates against.
    pub fn registry(&self) -> &Arc<StepRegistry> {
        &self.registry
    }

    /// Current form state.
    pub fn state(&self) -> &ApplicationFormState {
        &self.state
    }

    /// Persisted application id, once created.
    pub fn application_id(&self) -> Option<ApplicationId> {
        self.application_id
    }

    /// Upserted applicant id, once known.
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Whether final submission succeeded.
    pub fn submission_succeeded(&self) -> bool {
        self.submission_succeeded
    }

    /// Set one field and snapshot.
    pub async fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.state.set_field(&self.registry, name, value)?;
        self.save_form().await;
        Ok(())
    }

    /// Set several fields atomically: if any name is unknown nothing changes.
    pub async fn set_fields(&mut self, fields: FieldMap) -> Result<(), StoreError> {
        self.ensure_open()?;
        if let Some(unknown) = fields.keys().find(|k| !self.registry.is_known_field(k)) {
            return Err(StoreError::UnknownField {
                name: unknown.clone(),
            });
        }
        self.state.fields.extend(fields);
        self.save_form().await;
        Ok(())
    }

    /// See [`ApplicationFormState::validate_step`].
    pub fn validate_step(&self, step_id: &str) -> Result<bool, RegistryError> {
        self.state.validate_step(&self.registry, step_id)
    }

    /// See [`ApplicationFormState::missing_fields`].
    pub fn missing_fields(&self, step_id: &str) -> Result<Vec<String>, RegistryError> {
        self.state.missing_fields(&self.registry, step_id)
    }

    /// Mark a step completed and snapshot.
    pub async fn mark_step_completed(&mut self, step_id: &str) -> Result<bool, StoreError> {
        self.ensure_open()?;
        let inserted = self.state.mark_step_completed(&self.registry, step_id)?;
        if inserted {
            self.save_form().await;
        }
        Ok(inserted)
    }

    /// Replace the whole state (the result of a navigation transaction) and
    /// snapshot. The caller guarantees `next` came from this registry.
    pub async fn commit(&mut self, next: ApplicationFormState) -> Result<(), StoreError> {
        self.ensure_open()?;
        debug_assert!(next.is_consistent_with(&self.registry));
        self.state = next;
        self.save_form().await;
        Ok(())
    }

    /// Record the persisted application id.
    pub async fn set_application_id(&mut self, id: ApplicationId) {
        self.application_id = Some(id);
        self.save_key(APPLICATION_ID_KEY, &id).await;
    }

    /// Record the applicant's user id.
    pub async fn set_user_id(&mut self, id: UserId) {
        self.user_id = Some(id);
        self.save_key(USER_ID_KEY, &id).await;
    }

    /// Record a successful final submission. Field values are dropped here
    /// and from the snapshot; the application id and success flag remain.
    pub async fn record_submission(&mut self) {
        self.submission_succeeded = true;
        self.state = ApplicationFormState::submitted(&self.registry);
        self.save_key(SUBMISSION_SUCCESS_KEY, &true).await;
        if let Err(e) = self.snapshot.remove(FORM_DATA_KEY).await {
            tracing::warn!(error = %e, "failed to drop submitted form snapshot");
        }
    }

    /// Clear all state and every snapshot key.
    pub async fn reset(&mut self) {
        self.state.reset(&self.registry);
        self.application_id = None;
        self.user_id = None;
        self.submission_succeeded = false;
        if let Err(e) = snapshot::clear_all(self.snapshot.as_ref()).await {
            tracing::warn!(error = %e, "failed to clear form snapshot");
        }
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.submission_succeeded {
            return Err(StoreError::AlreadySubmitted);
        }
        Ok(())
    }

    async fn save_form(&self) {
        if let Err(e) = snapshot::save_form(self.snapshot.as_ref(), &self.state).await {
            tracing::warn!(error = %e, "failed to write form snapshot");
        }
    }

    async fn save_key<T: Serialize + Sync>(&self, key: &str, value: &T) {
        if let Err(e) = snapshot::write_key(self.snapshot.as_ref(), key, value).await {
            tracing::warn!(key, error = %e, "failed to write snapshot key");
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

//! # Navigation Controller
//!
//! Moves a form between steps.
//!
//! ```text
//!            advance (valid)            advance (valid)
//!  step N ─────────────────▶ step N+1 ─────────────────▶ … ─▶ terminal
//!     ▲                          │                               │
//!     └──────── go_back ─────────┘                   advance (valid)
//!                                                                │
//!                                                                ▼
//!                                                  AwaitingSubmission
//!                                                                │
//!                                                 complete() after persist
//!                                                                ▼
//!                                                           Completed
//! ```
//!
//! `jump_to` may target any completed step, or the single step right after
//! the furthest completed one.
//!
//! The navigator borrows a state mutably for one operation and returns the
//! events it produced. It performs no I/O: owners persist the new state,
//! then hand the events to the side-effect dispatcher. A failed operation
//! leaves the state untouched.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use intake_core::Timestamp;

use crate::registry::{RegistryError, StepRegistry};
use crate::store::ApplicationFormState;

// ─── Events ──────────────────────────────────────────────────────────

/// What triggered a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    /// Validated forward move.
    Advance,
    /// Move to the previous step.
    Back,
    /// Direct jump to a reachable step.
    Jump,
}

impl std::fmt::Display for TransitionCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Advance => "ADVANCE",
            Self::Back => "BACK",
            Self::Jump => "JUMP",
        })
    }
}

/// A change of current step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepChange {
    /// Step left.
    pub from: String,
    /// Step entered.
    pub to: String,
    /// Trigger.
    pub cause: TransitionCause,
    /// Step whose completion this transition recorded (advance only).
    pub completed_step: Option<String>,
}

/// The wizard reached its end and the submission was persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    /// The terminal step id.
    pub terminal_step: String,
    /// When completion was recorded.
    pub at: Timestamp,
}

/// Anything the navigator reports to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NavigationEvent {
    /// The current step changed.
    StepChanged(StepChange),
    /// The form was completed.
    Completed(Completion),
}

/// Result of a successful [`Navigator::advance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Moved to the next step.
    Moved(StepChange),
    /// The terminal step validated and is now completed; the owner must
    /// persist the submission and then call [`Navigator::complete`].
    AwaitingSubmission {
        /// The terminal step id.
        step: String,
    },
}

/// Length of the transition log kept in a form state. Older entries are
/// dropped first.
pub const MAX_TRANSITIONS: usize = 64;

/// Entry in the state's transition log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRecord {
    /// Step left.
    pub from: String,
    /// Step entered.
    pub to: String,
    /// Trigger.
    pub cause: TransitionCause,
    /// When.
    pub at: Timestamp,
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors from navigation operations.
#[derive(Error, Debug)]
pub enum NavigationError {
    /// The current step has empty required fields.
    #[error("step {step} is incomplete: missing {}", missing.join(", "))]
    Validation {
        /// The step that failed validation.
        step: String,
        /// Empty or absent required fields, in name order.
        missing: Vec<String>,
    },

    /// The jump target is neither completed nor the next reachable step.
    #[error("cannot navigate from {from} to {target}: step is not yet reachable")]
    InvalidNavigation {
        /// Current step.
        from: String,
        /// Rejected target.
        target: String,
    },

    /// The form has already been completed.
    #[error("application is already complete")]
    AlreadyComplete,

    /// `complete()` was called before the terminal step was completed.
    #[error("cannot complete from {current}: terminal step {terminal} is not completed")]
    NotReadyToComplete {
        /// Current step.
        current: String,
        /// The terminal step id.
        terminal: String,
    },

    /// A step id is not registered.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// ─── Navigator ───────────────────────────────────────────────────────

/// Navigation over one borrowed form state.
pub struct Navigator<'a> {
    registry: &'a StepRegistry,
    state: &'a mut ApplicationFormState,
}

impl<'a> Navigator<'a> {
    /// Borrow a state for navigation.
    pub fn new(registry: &'a StepRegistry, state: &'a mut ApplicationFormState) -> Self {
        Self { registry, state }
    }

    /// Validate the current step and move forward.
    ///
    /// On a validation failure the state is unchanged.
    pub fn advance(&mut self) -> Result<AdvanceOutcome, NavigationError> {
        if self.state.complete {
            return Err(NavigationError::AlreadyComplete);
        }

        let current = self.state.current_step_id.clone();
        let missing = self.state.missing_fields(self.registry, &current)?;
        if !missing.is_empty() {
            return Err(NavigationError::Validation {
                step: current,
                missing,
            });
        }

        let next = self.registry.next_step_id(&current)?.map(str::to_string);
        self.state.mark_step_completed(self.registry, &current)?;

        match next {
            Some(to) => {
                let change = self.move_to(to, TransitionCause::Advance, Some(current));
                Ok(AdvanceOutcome::Moved(change))
            }
            None => Ok(AdvanceOutcome::AwaitingSubmission { step: current }),
        }
    }

    /// Mark the form complete after the terminal submission was persisted.
    pub fn complete(&mut self) -> Result<Completion, NavigationError> {
        if self.state.complete {
            return Err(NavigationError::AlreadyComplete);
        }
        let terminal = &self.registry.terminal_step().id;
        if self.state.current_step_id != *terminal || !self.state.is_completed(terminal) {
            return Err(NavigationError::NotReadyToComplete {
                current: self.state.current_step_id.clone(),
                terminal: terminal.clone(),
            });
        }
        self.state.complete = true;
        Ok(Completion {
            terminal_step: terminal.clone(),
            at: Timestamp::now(),
        })
    }

    /// Move to the previous step. No re-validation. `None` at the first step.
    pub fn go_back(&mut self) -> Result<Option<StepChange>, NavigationError> {
        let current = self.state.current_step_id.clone();
        match self.registry.previous_step_id(&current)? {
            Some(prev) => {
                let prev = prev.to_string();
                Ok(Some(self.move_to(prev, TransitionCause::Back, None)))
            }
            None => Ok(None),
        }
    }

    /// Jump directly to `target`. `None` when already there.
    pub fn jump_to(&mut self, target: &str) -> Result<Option<StepChange>, NavigationError> {
        self.registry.get_step(target)?;
        if !self.can_jump_to(target)? {
            return Err(NavigationError::InvalidNavigation {
                from: self.state.current_step_id.clone(),
                target: target.to_string(),
            });
        }
        if self.state.current_step_id == target {
            return Ok(None);
        }
        Ok(Some(self.move_to(
            target.to_string(),
            TransitionCause::Jump,
            None,
        )))
    }

    /// Whether `target` is completed or is the immediate next step after the
    /// furthest completed one.
    pub fn can_jump_to(&self, target: &str) -> Result<bool, NavigationError> {
        self.registry.get_step(target)?;
        if self.state.is_completed(target) {
            return Ok(true);
        }
        Ok(self.frontier()?.as_deref() == Some(target))
    }

    /// The furthest completed step by order, if any.
    pub fn furthest_completed(&self) -> Option<&str> {
        self.registry
            .ordered_steps()
            .iter()
            .rev()
            .find(|s| self.state.is_completed(&s.id))
            .map(|s| s.id.as_str())
    }

    /// The first not-yet-reachable-by-history step: the step after the
    /// furthest completed one, or the first step when nothing is completed.
    /// `None` when the furthest completed step is terminal.
    pub fn frontier(&self) -> Result<Option<String>, NavigationError> {
        match self.furthest_completed() {
            Some(furthest) => Ok(self
                .registry
                .next_step_id(furthest)?
                .map(str::to_string)),
            None => Ok(Some(self.registry.first_step().id.clone())),
        }
    }

    fn move_to(
        &mut self,
        to: String,
        cause: TransitionCause,
        completed_step: Option<String>,
    ) -> StepChange {
        let from = std::mem::replace(&mut self.state.current_step_id, to.clone());
        self.state.transitions.push(TransitionRecord {
            from: from.clone(),
            to: to.clone(),
            cause,
            at: Timestamp::now(),
        });
        let log = &mut self.state.transitions;
        if log.len() > MAX_TRANSITIONS {
            log.drain(..log.len() - MAX_TRANSITIONS);
        }
        StepChange {
            from,
            to,
            cause,
            completed_step,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

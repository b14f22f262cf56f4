//! # intake-state: Wizard State Machine
//!
//! The multi-step loan application form as an explicit state machine.
//!
//! ## Components
//!
//! - **Registry** (`registry.rs`): the ordered, data-driven list of
//!   [`StepDefinition`]s. Built in via [`StepRegistry::loan_application`] or
//!   loaded from YAML. Pure lookup.
//!
//! - **Store** (`store.rs`): [`ApplicationFormState`] (fields, current step,
//!   completed steps) and [`FormStore`], which owns one session's state and
//!   writes a snapshot through a [`SnapshotStore`] after every mutation.
//!
//! - **Snapshot** (`snapshot.rs`): the client-side durable copy of a
//!   session, keyed by fixed storage keys.
//!
//! - **Navigation** (`navigation.rs`): [`Navigator`] computes advance, back,
//!   and jump transitions over a borrowed state and returns the resulting
//!   events. It never performs I/O; callers persist and dispatch.
//!
//! ## Design
//!
//! Steps use validated runtime transitions rather than one type per step:
//! the step list is data (it can be loaded from a file), so the set of states
//! is not known at compile time. Every transition returns `Result` with a
//! structured error naming the current step and the rejected target.

pub mod navigation;
pub mod registry;
pub mod snapshot;
pub mod store;

pub use navigation::{
    AdvanceOutcome, Completion, NavigationError, NavigationEvent, Navigator, StepChange,
    TransitionCause, TransitionRecord, MAX_TRANSITIONS,
};
pub use registry::{RegistryError, StepDefinition, StepRegistry};
pub use snapshot::{
    ClientSnapshot, FileSnapshotStore, MemorySnapshotStore, SnapshotError, SnapshotStore,
    APPLICATION_ID_KEY, FORM_DATA_KEY, SUBMISSION_SUCCESS_KEY, USER_ID_KEY,
};
pub use store::{ApplicationFormState, FormStore, StoreError};

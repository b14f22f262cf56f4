//! # intake-core: Foundational Types for the Loan Intake Stack
//!
//! Leaf crate of the workspace. Every other `intake-*` crate depends on it;
//! it depends on nothing internal.
//!
//! ## Contents
//!
//! - **Identifier newtypes** (`identity.rs`): `ApplicationId`, `UserId`,
//!   `SessionId`, `CheckId`, `UploadId`. No bare UUIDs cross crate
//!   boundaries, so a check id can never be passed where an application id
//!   is expected.
//!
//! - **`FieldValue`** (`field.rs`): the value of one form field (text,
//!   number, or flag) and the single definition of "empty" used by step
//!   validation.
//!
//! - **`Timestamp`** (`temporal.rs`): UTC-only, seconds precision.
//!
//! ## Crate Policy
//!
//! - No `unsafe` code.
//! - No `.unwrap()` outside tests.

pub mod error;
pub mod field;
pub mod identity;
pub mod temporal;

pub use error::CoreError;
pub use field::{FieldMap, FieldValue};
pub use identity::{ApplicationId, CheckId, SessionId, UploadId, UserId};
pub use temporal::Timestamp;

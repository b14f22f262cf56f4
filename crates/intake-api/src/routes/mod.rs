//! # API Route Modules
//!
//! - `steps`: the step table.
//! - `sessions`: the wizard (fields, advance, back, jump, reset, address
//!   suggestions).
//! - `applications`: direct application record access.
//! - `users`: applicant upsert.
//! - `bank_statements`: PDF upload.
//! - `compliance`: website checks.

pub mod applications;
pub mod bank_statements;
pub mod compliance;
pub mod sessions;
pub mod steps;
pub mod users;

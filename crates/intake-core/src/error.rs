//! # Error Types
//!
//! Errors raised while constructing core values from untrusted input.

use thiserror::Error;

/// Errors from parsing identifiers and timestamps.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An identifier string was not a valid UUID.
    #[error("invalid {kind} identifier {value:?}: {reason}")]
    InvalidIdentifier {
        /// Identifier namespace (e.g. "application").
        kind: &'static str,
        /// The rejected input.
        value: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// A timestamp string was malformed or not UTC.
    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp {
        /// The rejected input.
        value: String,
        /// Parser diagnostic.
        reason: String,
    },
}

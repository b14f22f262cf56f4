//! # Identifier Newtypes
//!
//! One newtype per record namespace. All are UUID-backed, `Copy`, and
//! serialize transparently as the bare UUID string so the JSON surface stays
//! `"id": "…"` while the Rust surface keeps namespaces apart.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $ty:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $ty(Uuid);

        impl $ty {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Parse from the hyphenated string form.
            pub fn parse(s: &str) -> Result<Self, CoreError> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|e| CoreError::InvalidIdentifier {
                        kind: $kind,
                        value: s.to_string(),
                        reason: e.to_string(),
                    })
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $ty {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<Uuid> for $ty {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_identifier!(
    /// Durable loan application record.
    ApplicationId,
    "application"
);

uuid_identifier!(
    /// Applicant user record, upserted by email.
    UserId,
    "user"
);

uuid_identifier!(
    /// One wizard session (one applicant working through the form).
    SessionId,
    "session"
);

uuid_identifier!(
    /// One compliance check run.
    CheckId,
    "check"
);

uuid_identifier!(
    /// One uploaded bank statement.
    UploadId,
    "upload"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique() {
        assert_ne!(ApplicationId::new(), ApplicationId::new());
    }

    #[test]
    fn parse_accepts_hyphenated_uuid() {
        let raw = "6f1b2d4e-8a9c-4c1e-9f00-0a1b2c3d4e5f";
        let id = ApplicationId::parse(raw).unwrap();
        assert_eq!(id.to_string(), raw);
    }

    #[test]
    fn parse_trims_whitespace() {
        let id = UserId::parse("  6f1b2d4e-8a9c-4c1e-9f00-0a1b2c3d4e5f ").unwrap();
        assert_eq!(id.to_string(), "6f1b2d4e-8a9c-4c1e-9f00-0a1b2c3d4e5f");
    }

    #[test]
    fn parse_rejects_garbage_with_kind() {
        let err = CheckId::parse("not-a-uuid").unwrap_err();
        match err {
            CoreError::InvalidIdentifier { kind, value, .. } => {
                assert_eq!(kind, "check");
                assert_eq!(value, "not-a-uuid");
            }
            other => panic!("expected InvalidIdentifier, got {other:?}"),
        }
    }

    #[test]
    fn serializes_as_bare_string() {
        let id = SessionId::parse("6f1b2d4e-8a9c-4c1e-9f00-0a1b2c3d4e5f").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"6f1b2d4e-8a9c-4c1e-9f00-0a1b2c3d4e5f\"");
        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}

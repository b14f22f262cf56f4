//! # Compliance Check Lifecycle
//!
//! ```text
//!   Pending ──complete(score, payload)──▶ Completed
//!      │
//!      └──────fail(message)─────────────▶ Failed
//! ```
//!
//! A check resolves exactly once. Both terminal states reject further
//! transitions with [`CheckError::AlreadyResolved`].

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use intake_core::{ApplicationId, CheckId, Timestamp};

// ─── Status ──────────────────────────────────────────────────────────

/// Lifecycle state of a compliance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// Created, not yet resolved.
    Pending,
    /// Scored successfully.
    Completed,
    /// Could not be scored.
    Failed,
}

impl CheckStatus {
    /// Whether this is a resolved state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse a storage name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of compliance check. Only website checks exist today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    /// Heuristic assessment of the business website.
    WebsiteCheck,
}

impl CheckType {
    /// Storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WebsiteCheck => "website_check",
        }
    }

    /// Parse a storage name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "website_check" => Some(Self::WebsiteCheck),
            _ => None,
        }
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors from check transitions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckError {
    /// The check already left `Pending`.
    #[error("compliance check {id} is already {status}")]
    AlreadyResolved {
        /// Check id.
        id: CheckId,
        /// Its terminal status.
        status: CheckStatus,
    },

    /// A score outside [0, 1] or NaN.
    #[error("risk score {score} is outside [0, 1]")]
    ScoreOutOfRange {
        /// The rejected score.
        score: f64,
    },
}

// ─── Check ───────────────────────────────────────────────────────────

/// A compliance check attached to an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceCheck {
    #[schema(value_type = String, format = Uuid)]
    pub id: CheckId,
    #[schema(value_type = String, format = Uuid)]
    pub application_id: ApplicationId,
    pub check_type: CheckType,
    pub status: CheckStatus,
    /// Set on completion; always within [0, 1].
    pub risk_score: Option<f64>,
    /// Structured result on completion.
    #[schema(value_type = Object)]
    pub result_payload: Option<serde_json::Value>,
    /// Reason on failure.
    pub error_message: Option<String>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: Timestamp,
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: Timestamp,
}

impl ComplianceCheck {
    /// A new pending check.
    pub fn pending(application_id: ApplicationId, check_type: CheckType) -> Self {
        let now = Timestamp::now();
        Self {
            id: CheckId::new(),
            application_id,
            check_type,
            status: CheckStatus::Pending,
            risk_score: None,
            result_payload: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn require_pending(&self) -> Result<(), CheckError> {
        if self.status.is_terminal() {
            return Err(CheckError::AlreadyResolved {
                id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    /// Pending → Completed.
    pub fn complete(
        &mut self,
        risk_score: f64,
        payload: serde_json::Value,
    ) -> Result<(), CheckError> {
        self.require_pending()?;
        if !(0.0..=1.0).contains(&risk_score) {
            return Err(CheckError::ScoreOutOfRange { score: risk_score });
        }
        self.status = CheckStatus::Completed;
        self.risk_score = Some(risk_score);
        self.result_payload = Some(payload);
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Pending → Failed.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), CheckError> {
        self.require_pending()?;
        self.status = CheckStatus::Failed;
        self.error_message = Some(message.into());
        self.updated_at = Timestamp::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check() -> ComplianceCheck {
        ComplianceCheck::pending(ApplicationId::new(), CheckType::WebsiteCheck)
    }

    #[test]
    fn new_check_is_pending() {
        let c = check();
        assert_eq!(c.status, CheckStatus::Pending);
        assert!(c.risk_score.is_none());
        assert!(c.result_payload.is_none());
    }

    #[test]
    fn complete_then_fail_is_rejected() {
        let mut c = check();
        c.complete(0.4, serde_json::json!({"reachable": true}))
            .unwrap();
        assert_eq!(c.status, CheckStatus::Completed);
        assert_eq!(c.risk_score, Some(0.4));

        let err = c.fail("late").unwrap_err();
        assert_eq!(
            err,
            CheckError::AlreadyResolved {
                id: c.id,
                status: CheckStatus::Completed
            }
        );
        assert!(c.error_message.is_none());
    }

    #[test]
    fn fail_then_complete_is_rejected() {
        let mut c = check();
        c.fail("invalid url").unwrap();
        assert_eq!(c.status, CheckStatus::Failed);
        assert!(c.complete(0.1, serde_json::Value::Null).is_err());
        assert!(c.fail("again").is_err());
        assert_eq!(c.error_message.as_deref(), Some("invalid url"));
    }

    #[test]
    fn out_of_range_score_leaves_check_pending() {
        let mut c = check();
        assert!(matches!(
            c.complete(1.5, serde_json::Value::Null),
            Err(CheckError::ScoreOutOfRange { .. })
        ));
        assert!(c.complete(f64::NAN, serde_json::Value::Null).is_err());
        assert_eq!(c.status, CheckStatus::Pending);
    }

    #[test]
    fn status_storage_names_parse_back() {
        for s in [CheckStatus::Pending, CheckStatus::Completed, CheckStatus::Failed] {
            assert_eq!(CheckStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(CheckStatus::parse("done"), None);
        assert_eq!(
            CheckType::parse(CheckType::WebsiteCheck.as_str()),
            Some(CheckType::WebsiteCheck)
        );
    }

    #[test]
    fn serializes_camel_case() {
        let c = check();
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["status"], "pending");
        assert_eq!(v["checkType"], "website_check");
        assert!(v.get("applicationId").is_some());
    }
}

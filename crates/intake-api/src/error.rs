//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from intake-state, intake-compliance, the persistence
//! adapter, and uploads to HTTP status codes with a JSON body carrying an
//! error code, message, and optional details. Internal error messages are
//! logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use intake_client::GeocodeError;
use intake_compliance::WebsiteCheckError;
use intake_core::CoreError;
use intake_state::{NavigationError, RegistryError, StoreError};

use crate::db::PersistenceError;
use crate::uploads::UploadError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional context for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// A step's required fields are empty (422). The body lists them.
    #[error("step {step} is incomplete")]
    StepIncomplete { step: String, missing: Vec<String> },

    /// Request body could not be parsed or contains invalid values (422).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Jump target is not reachable yet (409).
    #[error("{0}")]
    InvalidNavigation(String),

    /// The form was already submitted (409).
    #[error("application is already complete")]
    AlreadyComplete,

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Upload over the size cap (413).
    #[error("{0}")]
    PayloadTooLarge(String),

    /// Upload of a type other than PDF (415).
    #[error("{0}")]
    UnsupportedMediaType(String),

    /// The record could not be saved (503). The message is generic; the
    /// session state is left as it was so the applicant can retry.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Address provider failed (502).
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Service dependency not configured (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error (500).
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status code and machine-readable error code.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) | Self::StepIncomplete { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR")
            }
            Self::BadRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, "BAD_REQUEST"),
            Self::InvalidNavigation(_) => (StatusCode::CONFLICT, "INVALID_NAVIGATION"),
            Self::AlreadyComplete => (StatusCode::CONFLICT, "ALREADY_COMPLETE"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            Self::UnsupportedMediaType(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_MEDIA_TYPE")
            }
            Self::Persistence(_) => (StatusCode::SERVICE_UNAVAILABLE, "PERSISTENCE_ERROR"),
            Self::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            Self::ServiceUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE")
            }
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::StepIncomplete { step, missing } => {
                let field_errors: serde_json::Map<String, serde_json::Value> = missing
                    .iter()
                    .map(|f| (f.clone(), json!(format!("{f} is required"))))
                    .collect();
                Some(json!({
                    "step": step,
                    "missingFields": missing,
                    "fieldErrors": field_errors,
                }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::Persistence(_) => {
                "Your progress could not be saved. Please try again.".to_string()
            }
            Self::Upstream(_) => "An upstream service error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::Persistence(_) => tracing::error!(error = %self, "persistence failure"),
            Self::Upstream(_) => tracing::warn!(error = %self, "upstream error"),
            Self::ServiceUnavailable(_) => tracing::warn!(error = %self, "service unavailable"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

// ─── Domain conversions ──────────────────────────────────────────────

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownStep { .. } => Self::NotFound(err.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownField { .. } => Self::Validation(err.to_string()),
            StoreError::AlreadySubmitted => Self::AlreadyComplete,
            StoreError::Registry(e) => e.into(),
        }
    }
}

impl From<NavigationError> for AppError {
    fn from(err: NavigationError) -> Self {
        match err {
            NavigationError::Validation { step, missing } => Self::StepIncomplete { step, missing },
            NavigationError::InvalidNavigation { .. } => Self::InvalidNavigation(err.to_string()),
            NavigationError::AlreadyComplete => Self::AlreadyComplete,
            NavigationError::NotReadyToComplete { .. } => Self::Conflict(err.to_string()),
            NavigationError::Registry(e) => e.into(),
        }
    }
}

impl From<PersistenceError> for AppError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound { .. } => Self::NotFound(err.to_string()),
            PersistenceError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Persistence(other.to_string()),
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::TooLarge { .. } => Self::PayloadTooLarge(err.to_string()),
            UploadError::UnsupportedType { .. } => Self::UnsupportedMediaType(err.to_string()),
            UploadError::Empty | UploadError::Malformed(_) => Self::Validation(err.to_string()),
            UploadError::Storage(_) => Self::Persistence(err.to_string()),
        }
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<WebsiteCheckError> for AppError {
    fn from(err: WebsiteCheckError) -> Self {
        match err {
            WebsiteCheckError::Store(e) => Self::Persistence(e.to_string()),
            WebsiteCheckError::Lifecycle(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<GeocodeError> for AppError {
    fn from(err: GeocodeError) -> Self {
        match err {
            GeocodeError::NotConfigured { .. } => Self::ServiceUnavailable(err.to_string()),
            GeocodeError::Superseded => Self::Conflict(err.to_string()),
            other => Self::Upstream(other.to_string()),
        }
    }
}

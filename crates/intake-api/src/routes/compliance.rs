//! # Compliance Check API
//!
//! Synchronous website checks. The dispatcher runs the same service in the
//! background when the business-website step completes; this route lets
//! staff tooling re-run one on demand.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use intake_compliance::{CheckStatus, ComplianceCheck, WebsiteCheckRequest, WebsiteMetadata};
use intake_core::{ApplicationId, CheckId};

use crate::error::AppError;
use crate::extractors::{extract_json, extract_query};
use crate::state::AppState;

/// Outcome of a website check.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteCheckResponse {
    /// True when the check completed and was scored.
    pub success: bool,
    #[schema(value_type = String, format = Uuid)]
    pub check_id: CheckId,
    pub status: CheckStatus,
    pub risk_score: Option<f64>,
    pub metadata: Option<WebsiteMetadata>,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ChecksQuery {
    pub application_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChecksResponse {
    pub success: bool,
    pub checks: Vec<ComplianceCheck>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/compliance/website-check", post(website_check))
        .route("/api/compliance/get-checks", get(get_checks))
}

/// POST /api/compliance/website-check: Fetch and score a business website.
#[utoipa::path(
    post,
    path = "/api/compliance/website-check",
    request_body = WebsiteCheckRequest,
    responses(
        (status = 200, description = "Check resolved; `success` is false when it failed", body = WebsiteCheckResponse),
        (status = 422, description = "Malformed request", body = crate::error::ErrorBody),
        (status = 503, description = "Check could not be recorded", body = crate::error::ErrorBody),
    ),
    tag = "compliance"
)]
pub async fn website_check(
    State(state): State<AppState>,
    body: Result<Json<WebsiteCheckRequest>, JsonRejection>,
) -> Result<Json<WebsiteCheckResponse>, AppError> {
    let req = extract_json(body)?;
    if req.business_website.trim().is_empty() {
        return Err(AppError::Validation(
            "businessWebsite must be non-empty".to_string(),
        ));
    }
    let outcome = state.website_checks.run(&req).await?;
    state
        .metrics
        .record_website_check(outcome.check.status.as_str());

    Ok(Json(WebsiteCheckResponse {
        success: outcome.check.status == CheckStatus::Completed,
        check_id: outcome.check.id,
        status: outcome.check.status,
        risk_score: outcome.risk_score(),
        metadata: outcome.metadata,
        error_message: outcome.check.error_message,
    }))
}

/// GET /api/compliance/get-checks: Checks for an application, oldest first.
#[utoipa::path(
    get,
    path = "/api/compliance/get-checks",
    params(ChecksQuery),
    responses(
        (status = 200, description = "Checks", body = ChecksResponse),
    ),
    tag = "compliance"
)]
pub async fn get_checks(
    State(state): State<AppState>,
    query: Result<Query<ChecksQuery>, QueryRejection>,
) -> Result<Json<ChecksResponse>, AppError> {
    let query = extract_query(query)?;
    let checks = state
        .repository
        .list_checks(ApplicationId::from_uuid(query.application_id))
        .await?;
    Ok(Json(ChecksResponse {
        success: true,
        checks,
    }))
}

//! # Applicant Upsert API

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use intake_core::ApplicationId;

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::records::{normalize_email, UserInput, UserRecord};
use crate::state::AppState;

/// Upsert request. The email is the natural key.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertUserRequest {
    pub user_data: UserInput,
    /// Link the applicant to this application.
    #[serde(default)]
    pub application_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpsertUserResponse {
    pub success: bool,
    pub user: UserRecord,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/users/upsert", post(upsert_user))
}

/// POST /api/users/upsert: Insert or update an applicant by email.
#[utoipa::path(
    post,
    path = "/api/users/upsert",
    request_body = UpsertUserRequest,
    responses(
        (status = 200, description = "Applicant saved", body = UpsertUserResponse),
        (status = 404, description = "Application not found", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid email", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub async fn upsert_user(
    State(state): State<AppState>,
    body: Result<Json<UpsertUserRequest>, JsonRejection>,
) -> Result<Json<UpsertUserResponse>, AppError> {
    let req = extract_json(body)?;
    let mut profile = req.user_data;
    profile.email = normalize_email(&profile.email)
        .ok_or_else(|| AppError::Validation("a valid email is required".to_string()))?;

    let application = req.application_id.map(ApplicationId::from_uuid);
    // A missing application must not leave a stray applicant behind.
    if let Some(app) = application {
        if state.repository.get_application(app).await?.is_none() {
            return Err(AppError::NotFound(format!("application {app} not found")));
        }
    }

    let mut user = state.repository.upsert_user(profile).await?;
    if let Some(app) = application {
        state.repository.link_user(user.id, app).await?;
        user.application_id = Some(app);
    }
    tracing::info!(user_id = %user.id, "applicant upserted");
    Ok(Json(UpsertUserResponse {
        success: true,
        user,
    }))
}

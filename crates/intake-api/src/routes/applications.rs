//! # Application Records API
//!
//! Direct access to persisted applications, for clients that drive the
//! form themselves instead of through a session. Field names are checked
//! against the step registry; a submitted application rejects updates.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use intake_core::{ApplicationId, FieldMap};
use intake_state::StepRegistry;

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::records::{ApplicationDraft, ApplicationRecord};
use crate::state::AppState;

/// Create or update an application.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRequest {
    #[serde(default)]
    #[schema(value_type = Object)]
    pub fields: FieldMap,
    /// Replaces the stored navigation position when given.
    #[serde(default)]
    pub current_step_id: Option<String>,
    #[serde(default)]
    pub completed_steps: Vec<String>,
    /// Submit with this write. Irreversible.
    #[serde(default)]
    pub submit: bool,
}

impl ApplicationRequest {
    fn into_draft(self, registry: &StepRegistry) -> Result<ApplicationDraft, AppError> {
        if let Some(unknown) = self.fields.keys().find(|k| !registry.is_known_field(k)) {
            return Err(AppError::Validation(format!("unknown field: {unknown}")));
        }
        let steps = self.current_step_id.iter().chain(&self.completed_steps);
        for step in steps {
            registry.get_step(step).map_err(|e| AppError::Validation(e.to_string()))?;
        }
        Ok(ApplicationDraft {
            fields: self.fields,
            current_step_id: self.current_step_id,
            completed_steps: self.completed_steps,
            submit: self.submit,
        })
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/applications", post(create_application))
        .route(
            "/api/applications/{id}",
            get(get_application).put(update_application),
        )
}

/// POST /api/applications: Create an application record.
#[utoipa::path(
    post,
    path = "/api/applications",
    request_body = ApplicationRequest,
    responses(
        (status = 201, description = "Application created", body = ApplicationRecord),
        (status = 422, description = "Unknown field or step", body = crate::error::ErrorBody),
        (status = 503, description = "Could not be saved", body = crate::error::ErrorBody),
    ),
    tag = "applications"
)]
pub async fn create_application(
    State(state): State<AppState>,
    body: Result<Json<ApplicationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApplicationRecord>), AppError> {
    let draft = extract_json(body)?.into_draft(&state.registry)?;
    let record = state.repository.create_application(draft).await?;
    tracing::info!(application_id = %record.id, status = record.status.as_str(), "application created");
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/applications/{id}: Fetch an application record.
#[utoipa::path(
    get,
    path = "/api/applications/{id}",
    params(("id" = Uuid, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Application found", body = ApplicationRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "applications"
)]
pub async fn get_application(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApplicationRecord>, AppError> {
    let id = ApplicationId::from_uuid(id);
    state
        .repository
        .get_application(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("application {id} not found")))
}

/// PUT /api/applications/{id}: Merge fields into a draft application.
#[utoipa::path(
    put,
    path = "/api/applications/{id}",
    params(("id" = Uuid, Path, description = "Application ID")),
    request_body = ApplicationRequest,
    responses(
        (status = 200, description = "Application updated", body = ApplicationRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "Already submitted", body = crate::error::ErrorBody),
    ),
    tag = "applications"
)]
pub async fn update_application(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<ApplicationRequest>, JsonRejection>,
) -> Result<Json<ApplicationRecord>, AppError> {
    let draft = extract_json(body)?.into_draft(&state.registry)?;
    let record = state
        .repository
        .update_application(ApplicationId::from_uuid(id), draft)
        .await?;
    Ok(Json(record))
}

//! # Wizard Session API
//!
//! Each handler locks one session for the duration of the request. The
//! advance handler hands any triggered side effect to the dispatcher after
//! the transition is committed and before responding; the response never
//! waits for the effect.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use intake_client::{AddressLookup, AddressSuggestion};
use intake_core::{FieldMap, SessionId};

use crate::error::AppError;
use crate::extractors::{extract_json, extract_optional_json, extract_query, extract_validated_json, Validate};
use crate::session::SessionView;
use crate::state::AppState;

/// Start or resume a session.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Resume this session's snapshot. A new id is issued when omitted.
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

/// Field values to merge into the form.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateFieldsRequest {
    #[schema(value_type = Object)]
    pub fields: FieldMap,
}

/// Jump target.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JumpRequest {
    pub step_id: String,
}

impl Validate for JumpRequest {
    fn validate(&self) -> Result<(), String> {
        if self.step_id.trim().is_empty() {
            return Err("stepId must be non-empty".to_string());
        }
        Ok(())
    }
}

/// Address autocomplete query.
#[derive(Debug, Deserialize, IntoParams)]
pub struct SuggestionQuery {
    /// Partial address as typed.
    pub text: String,
}

/// Address autocomplete results.
#[derive(Debug, Serialize, ToSchema)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<AddressSuggestion>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session))
        .route("/api/sessions/{id}/fields", put(update_fields))
        .route("/api/sessions/{id}/advance", post(advance))
        .route("/api/sessions/{id}/back", post(go_back))
        .route("/api/sessions/{id}/jump", post(jump))
        .route("/api/sessions/{id}/reset", post(reset))
        .route(
            "/api/sessions/{id}/address-suggestions",
            get(address_suggestions),
        )
}

/// POST /api/sessions: Start a session, or resume one by id.
#[utoipa::path(
    post,
    path = "/api/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session opened", body = SessionView),
    ),
    tag = "sessions"
)]
pub async fn create_session(
    State(state): State<AppState>,
    body: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let req = extract_optional_json(body)?;
    let handle = state
        .sessions
        .open(req.session_id.map(SessionId::from_uuid))
        .await?;
    let session = handle.lock().await;
    Ok((
        StatusCode::CREATED,
        Json(session.view(&state.config.application_version, None)),
    ))
}

/// GET /api/sessions/{id}: Current session state.
#[utoipa::path(
    get,
    path = "/api/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session state", body = SessionView),
        (status = 404, description = "Unknown session", body = crate::error::ErrorBody),
    ),
    tag = "sessions"
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let handle = state.sessions.require(SessionId::from_uuid(id))?;
    let session = handle.lock().await;
    Ok(Json(session.view(&state.config.application_version, None)))
}

/// PUT /api/sessions/{id}/fields: Merge field values.
#[utoipa::path(
    put,
    path = "/api/sessions/{id}/fields",
    params(("id" = Uuid, Path, description = "Session ID")),
    request_body = UpdateFieldsRequest,
    responses(
        (status = 200, description = "Fields saved", body = SessionView),
        (status = 422, description = "Unknown field name", body = crate::error::ErrorBody),
    ),
    tag = "sessions"
)]
pub async fn update_fields(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateFieldsRequest>, JsonRejection>,
) -> Result<Json<SessionView>, AppError> {
    let req = extract_json(body)?;
    let handle = state.sessions.require(SessionId::from_uuid(id))?;
    let mut session = handle.lock().await;
    session.set_fields(req.fields).await?;
    Ok(Json(session.view(&state.config.application_version, None)))
}

/// POST /api/sessions/{id}/advance: Validate the current step and move on.
#[utoipa::path(
    post,
    path = "/api/sessions/{id}/advance",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Moved to the next step, or submitted and closed", body = SessionView),
        (status = 409, description = "Already complete", body = crate::error::ErrorBody),
        (status = 422, description = "Required fields missing", body = crate::error::ErrorBody),
        (status = 503, description = "Application could not be saved", body = crate::error::ErrorBody),
    ),
    tag = "sessions"
)]
pub async fn advance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let id = SessionId::from_uuid(id);
    let handle = state.sessions.require(id)?;
    let mut session = handle.lock().await;
    let advanced = session.advance(state.repository.as_ref()).await?;
    if let Some(effect) = advanced.side_effect {
        state.dispatcher.enqueue(effect);
    }
    let view = session.view(&state.config.application_version, Some(advanced.event));
    if view.submission_succeeded {
        state.close_session(id);
    }
    Ok(Json(view))
}

/// POST /api/sessions/{id}/back: Previous step.
#[utoipa::path(
    post,
    path = "/api/sessions/{id}/back",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Moved back, or already at the first step", body = SessionView),
    ),
    tag = "sessions"
)]
pub async fn go_back(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let handle = state.sessions.require(SessionId::from_uuid(id))?;
    let mut session = handle.lock().await;
    let event = session.go_back().await?;
    Ok(Json(session.view(&state.config.application_version, event)))
}

/// POST /api/sessions/{id}/jump: Go to a completed or next reachable step.
#[utoipa::path(
    post,
    path = "/api/sessions/{id}/jump",
    params(("id" = Uuid, Path, description = "Session ID")),
    request_body = JumpRequest,
    responses(
        (status = 200, description = "Moved", body = SessionView),
        (status = 404, description = "Unknown step", body = crate::error::ErrorBody),
        (status = 409, description = "Step not reachable yet", body = crate::error::ErrorBody),
    ),
    tag = "sessions"
)]
pub async fn jump(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<JumpRequest>, JsonRejection>,
) -> Result<Json<SessionView>, AppError> {
    let req = extract_validated_json(body)?;
    let handle = state.sessions.require(SessionId::from_uuid(id))?;
    let mut session = handle.lock().await;
    let event = session.jump_to(req.step_id.trim()).await?;
    Ok(Json(session.view(&state.config.application_version, event)))
}

/// POST /api/sessions/{id}/reset: Clear the form.
#[utoipa::path(
    post,
    path = "/api/sessions/{id}/reset",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Form cleared", body = SessionView),
    ),
    tag = "sessions"
)]
pub async fn reset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let handle = state.sessions.require(SessionId::from_uuid(id))?;
    let mut session = handle.lock().await;
    session.reset().await;
    Ok(Json(session.view(&state.config.application_version, None)))
}

/// GET /api/sessions/{id}/address-suggestions: Debounced autocomplete.
#[utoipa::path(
    get,
    path = "/api/sessions/{id}/address-suggestions",
    params(("id" = Uuid, Path, description = "Session ID"), SuggestionQuery),
    responses(
        (status = 200, description = "Suggestions", body = SuggestionsResponse),
        (status = 409, description = "Superseded by a newer lookup", body = crate::error::ErrorBody),
        (status = 503, description = "Address lookup not configured", body = crate::error::ErrorBody),
    ),
    tag = "sessions"
)]
pub async fn address_suggestions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    query: Result<Query<SuggestionQuery>, QueryRejection>,
) -> Result<Json<SuggestionsResponse>, AppError> {
    let query = extract_query(query)?;
    let id = SessionId::from_uuid(id);
    state.sessions.require(id)?;
    let lookup = state.address_lookup_for(id).ok_or_else(|| {
        AppError::ServiceUnavailable("address lookup is not configured".to_string())
    })?;
    let suggestions = lookup.suggest(&query.text).await?;
    Ok(Json(SuggestionsResponse { suggestions }))
}

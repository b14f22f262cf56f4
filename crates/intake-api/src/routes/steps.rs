//! # Step Table API

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use intake_state::StepDefinition;

use crate::state::AppState;

/// One step as published to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub id: String,
    pub order: u32,
    pub title: String,
    pub required_fields: Vec<String>,
    pub optional_fields: Vec<String>,
    pub is_terminal: bool,
}

impl From<&StepDefinition> for StepView {
    fn from(step: &StepDefinition) -> Self {
        Self {
            id: step.id.clone(),
            order: step.order,
            title: step.title.clone(),
            required_fields: step.required_fields.iter().cloned().collect(),
            optional_fields: step.optional_fields.iter().cloned().collect(),
            is_terminal: step.is_terminal,
        }
    }
}

/// The ordered step table.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepsResponse {
    pub application_version: String,
    pub steps: Vec<StepView>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/steps", get(list_steps))
}

/// GET /api/steps: Ordered step definitions.
#[utoipa::path(
    get,
    path = "/api/steps",
    responses(
        (status = 200, description = "Steps in wizard order", body = StepsResponse),
    ),
    tag = "steps"
)]
pub async fn list_steps(State(state): State<AppState>) -> Json<StepsResponse> {
    Json(StepsResponse {
        application_version: state.config.application_version.clone(),
        steps: state.registry.ordered_steps().iter().map(StepView::from).collect(),
    })
}

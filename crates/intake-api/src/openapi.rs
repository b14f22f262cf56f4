//! # OpenAPI Specification Assembly
//!
//! Collects every utoipa-documented route into one OpenAPI 3.1 document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// OpenAPI document for the intake API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Loan Intake API",
        version = "0.1.0",
        description = "Backend for the multi-step loan application form.\n\nProvides:\n- **Sessions**: field entry, validated advance, back, jump, reset, and address autocomplete\n- **Applications**: direct draft and submission records\n- **Users**: applicant upsert keyed by email\n- **Uploads**: PDF bank statements up to 10 MB\n- **Compliance**: business website checks and their history\n\nHealth probes (`/health/*`) and `/metrics` sit outside the `/api` surface."
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    paths(
        // ── Steps ───────────────────────────────────────────────────────
        crate::routes::steps::list_steps,
        // ── Sessions ────────────────────────────────────────────────────
        crate::routes::sessions::create_session,
        crate::routes::sessions::get_session,
        crate::routes::sessions::update_fields,
        crate::routes::sessions::advance,
        crate::routes::sessions::go_back,
        crate::routes::sessions::jump,
        crate::routes::sessions::reset,
        crate::routes::sessions::address_suggestions,
        // ── Applications ────────────────────────────────────────────────
        crate::routes::applications::create_application,
        crate::routes::applications::get_application,
        crate::routes::applications::update_application,
        // ── Users ───────────────────────────────────────────────────────
        crate::routes::users::upsert_user,
        // ── Uploads ─────────────────────────────────────────────────────
        crate::routes::bank_statements::upload_bank_statement,
        // ── Compliance ──────────────────────────────────────────────────
        crate::routes::compliance::website_check,
        crate::routes::compliance::get_checks,
    ),
    components(
        schemas(
            // ── Records ─────────────────────────────────────────────────
            crate::records::ApplicationStatus,
            crate::records::ApplicationRecord,
            crate::records::UserInput,
            crate::records::UserRecord,
            intake_compliance::CheckStatus,
            intake_compliance::CheckType,
            intake_compliance::ComplianceCheck,
            intake_compliance::WebsiteMetadata,
            intake_compliance::SocialLinks,
            intake_compliance::WebsiteCheckRequest,
            intake_client::AddressSuggestion,
            // ── Errors ──────────────────────────────────────────────────
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            // ── Route DTOs ──────────────────────────────────────────────
            crate::routes::steps::StepView,
            crate::routes::steps::StepsResponse,
            crate::session::SessionView,
            crate::routes::sessions::CreateSessionRequest,
            crate::routes::sessions::UpdateFieldsRequest,
            crate::routes::sessions::JumpRequest,
            crate::routes::sessions::SuggestionsResponse,
            crate::routes::applications::ApplicationRequest,
            crate::routes::users::UpsertUserRequest,
            crate::routes::users::UpsertUserResponse,
            crate::routes::bank_statements::UploadResponse,
            crate::routes::compliance::WebsiteCheckResponse,
            crate::routes::compliance::ChecksResponse,
        ),
    ),
    tags(
        (name = "steps", description = "Ordered step definitions"),
        (name = "sessions", description = "Wizard sessions: fields, navigation, and address autocomplete"),
        (name = "applications", description = "Application drafts and submissions"),
        (name = "users", description = "Applicant records keyed by email"),
        (name = "uploads", description = "Bank statement PDF uploads"),
        (name = "compliance", description = "Business website checks"),
    )
)]
pub struct ApiDoc;

/// Serves the document at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_generates() {
        let doc = ApiDoc::openapi();
        assert_eq!(doc.info.title, "Loan Intake API");
    }

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/steps",
            "/api/sessions",
            "/api/sessions/{id}/advance",
            "/api/sessions/{id}/jump",
            "/api/applications/{id}",
            "/api/users/upsert",
            "/api/bank-statement",
            "/api/compliance/website-check",
            "/api/compliance/get-checks",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn error_schema_is_registered() {
        let doc = ApiDoc::openapi();
        let schemas = &doc.components.expect("components").schemas;
        assert!(schemas.contains_key("ErrorBody"));
        assert!(schemas.contains_key("SessionView"));
    }
}

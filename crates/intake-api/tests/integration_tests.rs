//! # Integration Tests for intake-api
//!
//! Drives the full router with an in-memory repository, local file storage
//! in a temp dir, and an offline page fetcher.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use url::Url;

use intake_api::config::AppConfig;
use intake_api::db::memory::MemoryRepository;
use intake_api::state::{AppState, Backends};
use intake_api::uploads::{FileStorage, LocalFileStorage, StoredFile, UploadError};
use intake_compliance::{FetchError, FetchedPage, PageFetcher};
use intake_state::StepRegistry;

// -- Harness ------------------------------------------------------------------

struct Offline;

#[async_trait]
impl PageFetcher for Offline {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        Err(FetchError::Client(format!("offline: {url}")))
    }
}

/// Local storage that counts calls.
struct CountingStorage {
    inner: LocalFileStorage,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl FileStorage for CountingStorage {
    async fn store(&self, bytes: &[u8]) -> Result<StoredFile, UploadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.store(bytes).await
    }
}

struct Harness {
    app: axum::Router,
    state: AppState,
    repo: MemoryRepository,
    stores: Arc<AtomicUsize>,
    _dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        upload_dir: dir.path().join("uploads"),
        ..AppConfig::default()
    };
    let repo = MemoryRepository::new();
    let stores = Arc::new(AtomicUsize::new(0));
    let storage = CountingStorage {
        inner: LocalFileStorage::new(&config.upload_dir, &config.public_base_url),
        calls: Arc::clone(&stores),
    };
    let state = AppState::new(
        config,
        Arc::new(StepRegistry::loan_application()),
        Backends {
            repository: Arc::new(repo.clone()),
            storage: Arc::new(storage),
            fetcher: Arc::new(Offline),
            address_lookup: None,
        },
    );
    Harness {
        app: intake_api::app(state.clone()),
        state,
        repo,
        stores,
        _dir: dir,
    }
}

impl Harness {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    async fn metrics_text(&self) -> String {
        let response = self
            .app
            .clone()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn post_empty(&self, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn open_session(&self) -> String {
        let (status, body) = self.post_empty("/api/sessions").await;
        assert_eq!(status, StatusCode::CREATED);
        body["sessionId"].as_str().unwrap().to_string()
    }

    async fn answer(&self, session: &str, fields: Value) {
        let (status, body) = self
            .json(
                "PUT",
                &format!("/api/sessions/{session}/fields"),
                json!({ "fields": fields }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    async fn advance(&self, session: &str) -> (StatusCode, Value) {
        self.post_empty(&format!("/api/sessions/{session}/advance"))
            .await
    }
}

/// Answers for steps 1 through 10.
fn business_answers() -> Value {
    json!({
        "loanType": "business-loan",
        "isBusinessOwner": true,
        "fundingAmount": 50000,
        "fundingTimeline": "asap",
        "businessName": "Acme",
        "businessEntityType": "llc",
        "businessAddress": "1 Main St",
        "businessCity": "Springfield",
        "businessState": "IL",
        "businessZip": "62701",
        "industry": "retail",
        "timeInBusiness": "2-5 years",
        "ein": "12-3456789",
        "businessWebsite": "acme.example",
        "monthlyRevenue": "10k-50k",
        "creditScore": "700+",
    })
}

const BOUNDARY: &str = "intake-test-boundary";

fn multipart_upload(content_type: &str, bytes: &[u8], application_id: Option<&str>) -> Request<Body> {
    let mut body = Vec::new();
    if let Some(id) = application_id {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"applicationId\"\r\n\r\n{id}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"statement.pdf\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/bank-statement")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn pdf_of_size(size: usize) -> Vec<u8> {
    let mut bytes = b"%PDF-1.4\n".to_vec();
    bytes.resize(size, b'0');
    bytes
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn liveness_and_readiness() {
    let h = harness();
    let (status, body) = h.get("/health/liveness").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));

    let (status, body) = h.get("/health/readiness").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ready".into()));
}

// -- Steps --------------------------------------------------------------------

#[tokio::test]
async fn step_table_is_ordered() {
    let h = harness();
    let (status, body) = h.get("/api/steps").await;
    assert_eq!(status, StatusCode::OK);
    let steps = body["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 14);
    assert_eq!(steps[0]["id"], "loan-type");
    assert_eq!(steps[13]["id"], "review-submit");
    assert_eq!(steps[13]["isTerminal"], true);
    assert_eq!(body["applicationVersion"], "v1");
}

// -- Sessions -----------------------------------------------------------------

#[tokio::test]
async fn advance_without_answer_reports_missing_fields() {
    let h = harness();
    let session = h.open_session().await;
    let (status, body) = h.advance(&session).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"]["step"], "loan-type");
    assert_eq!(body["error"]["details"]["missingFields"], json!(["loanType"]));

    let (_, view) = h.get(&format!("/api/sessions/{session}")).await;
    assert_eq!(view["currentStepId"], "loan-type");
    assert_eq!(view["applicationId"], Value::Null);
}

#[tokio::test]
async fn answered_step_advances_and_persists() {
    let h = harness();
    let session = h.open_session().await;
    h.answer(&session, json!({ "loanType": "business-loan" }))
        .await;
    let (status, view) = h.advance(&session).await;
    assert_eq!(status, StatusCode::OK, "{view}");
    assert_eq!(view["currentStepId"], "business-owner");
    assert_eq!(view["completedSteps"], json!(["loan-type"]));
    assert_eq!(view["event"]["type"], "step_changed");
    assert_eq!(view["event"]["from"], "loan-type");

    let app_id = view["applicationId"].as_str().unwrap();
    let (status, record) = h.get(&format!("/api/applications/{app_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["fields"]["loanType"], "business-loan");
    assert_eq!(record["status"], "draft");
}

#[tokio::test]
async fn whitespace_answer_does_not_count() {
    let h = harness();
    let session = h.open_session().await;
    h.answer(&session, json!({ "loanType": "   " })).await;
    let (status, _) = h.advance(&session).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_field_is_rejected() {
    let h = harness();
    let session = h.open_session().await;
    let (status, body) = h
        .json(
            "PUT",
            &format!("/api/sessions/{session}/fields"),
            json!({ "fields": { "favouriteColour": "blue" } }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn jump_past_frontier_is_a_conflict() {
    let h = harness();
    let session = h.open_session().await;
    let (status, body) = h
        .json(
            "POST",
            &format!("/api/sessions/{session}/jump"),
            json!({ "stepId": "credit-score" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_NAVIGATION");

    let (status, _) = h
        .json(
            "POST",
            &format!("/api/sessions/{session}/jump"),
            json!({ "stepId": "no-such-step" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn back_then_jump_forward() {
    let h = harness();
    let session = h.open_session().await;
    h.answer(
        &session,
        json!({ "loanType": "business-loan", "isBusinessOwner": true }),
    )
    .await;
    h.advance(&session).await;
    h.advance(&session).await;

    let (status, view) = h.post_empty(&format!("/api/sessions/{session}/back")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["currentStepId"], "business-owner");
    assert_eq!(view["event"]["cause"], "back");

    let (status, view) = h
        .json(
            "POST",
            &format!("/api/sessions/{session}/jump"),
            json!({ "stepId": "funding-amount" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["currentStepId"], "funding-amount");
}

#[tokio::test]
async fn back_on_first_step_is_a_no_op() {
    let h = harness();
    let session = h.open_session().await;
    let (status, view) = h.post_empty(&format!("/api/sessions/{session}/back")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["currentStepId"], "loan-type");
    assert!(view.get("event").is_none());
    assert_eq!(view["canGoBack"], false);
}

#[tokio::test]
async fn reset_clears_the_form() {
    let h = harness();
    let session = h.open_session().await;
    h.answer(&session, json!({ "loanType": "business-loan" }))
        .await;
    h.advance(&session).await;
    let (status, view) = h.post_empty(&format!("/api/sessions/{session}/reset")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["currentStepId"], "loan-type");
    assert_eq!(view["fields"], json!({}));
    assert_eq!(view["applicationId"], Value::Null);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let h = harness();
    let (status, body) = h
        .get("/api/sessions/6f1c2d3e-0000-4000-8000-000000000000")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn resuming_by_id_returns_the_same_session() {
    let h = harness();
    let session = h.open_session().await;
    h.answer(&session, json!({ "loanType": "sba-loan" })).await;
    let (status, view) = h
        .json("POST", "/api/sessions", json!({ "sessionId": session }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(view["sessionId"], session.as_str());
    assert_eq!(view["fields"]["loanType"], "sba-loan");
}

#[tokio::test]
async fn submitting_closes_the_session() {
    let h = harness();
    let session = h.open_session().await;
    let mut answers = business_answers();
    for (field, value) in [
        ("firstName", json!("Ada")),
        ("lastName", json!("Lovelace")),
        ("email", json!("ada@example.com")),
        ("phone", json!("555-0100")),
        ("homeAddress", json!("2 Elm St")),
        ("homeCity", json!("Springfield")),
        ("homeState", json!("IL")),
        ("homeZip", json!("62701")),
        ("bankStatementUploadId", json!("statement-1")),
        ("consentToTerms", json!(true)),
        ("consentToCreditCheck", json!(true)),
    ] {
        answers[field] = value;
    }
    h.answer(&session, answers).await;

    let mut last = Value::Null;
    for _ in 0..14 {
        let (status, view) = h.advance(&session).await;
        assert_eq!(status, StatusCode::OK, "{view}");
        last = view;
    }
    assert_eq!(last["submissionSucceeded"], true);
    assert_eq!(last["complete"], true);
    assert_eq!(last["fields"], json!({}));

    let (status, _) = h.get(&format!("/api/sessions/{session}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(h.state.sessions.is_empty());
    h.state.dispatcher.drain().await;
}

#[tokio::test]
async fn idle_sessions_are_closed() {
    let h = harness();
    let session = h.open_session().await;
    assert!(h.metrics_text().await.contains("intake_sessions_open 1"));

    assert_eq!(h.state.evict_idle_sessions(Duration::from_secs(3600)), 0);
    assert_eq!(h.state.evict_idle_sessions(Duration::ZERO), 1);

    let (status, _) = h.get(&format!("/api/sessions/{session}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(h.metrics_text().await.contains("intake_sessions_open 0"));
}

#[tokio::test]
async fn address_suggestions_need_a_configured_lookup() {
    let h = harness();
    let session = h.open_session().await;
    let (status, body) = h
        .get(&format!(
            "/api/sessions/{session}/address-suggestions?text=1%20Main"
        ))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
}

// -- Side effects ---------------------------------------------------------------

#[tokio::test]
async fn personal_information_saves_the_applicant_in_the_background() {
    let h = harness();
    let session = h.open_session().await;
    let mut answers = business_answers();
    answers["firstName"] = json!("Ada");
    answers["lastName"] = json!("Lovelace");
    answers["email"] = json!("Ada@Example.com");
    answers["phone"] = json!("555-0100");
    h.answer(&session, answers).await;

    for _ in 0..11 {
        let (status, view) = h.advance(&session).await;
        assert_eq!(status, StatusCode::OK, "{view}");
    }
    h.state.dispatcher.drain().await;

    let (_, view) = h.get(&format!("/api/sessions/{session}")).await;
    assert_eq!(view["currentStepId"], "home-address");
    assert!(view["userId"].is_string());
    assert_eq!(h.repo.user_count(), 1);

    let app_id = view["applicationId"].as_str().unwrap();
    let (status, body) = h
        .get(&format!("/api/compliance/get-checks?applicationId={app_id}"))
        .await;
    assert_eq!(status, StatusCode::OK);
    let checks = body["checks"].as_array().unwrap();
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0]["status"], "completed");
}

#[tokio::test]
async fn failed_side_effect_does_not_change_the_response() {
    let h = harness();
    let session = h.open_session().await;
    let mut answers = business_answers();
    answers["firstName"] = json!("Ada");
    answers["lastName"] = json!("Lovelace");
    answers["email"] = json!("not-an-email");
    answers["phone"] = json!("555-0100");
    h.answer(&session, answers).await;

    let mut last = Value::Null;
    for _ in 0..11 {
        let (status, view) = h.advance(&session).await;
        assert_eq!(status, StatusCode::OK, "{view}");
        last = view;
    }
    assert_eq!(last["currentStepId"], "home-address");

    h.state.dispatcher.drain().await;
    assert_eq!(h.repo.user_count(), 0);
    assert_eq!(h.state.metrics.side_effect_failures(), 1);
}

// -- Applications ---------------------------------------------------------------

#[tokio::test]
async fn submitted_application_rejects_updates() {
    let h = harness();
    let (status, record) = h
        .json(
            "POST",
            "/api/applications",
            json!({ "fields": { "loanType": "business-loan" }, "submit": true }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record["status"], "submitted");
    assert!(record["submittedAt"].is_string());

    let id = record["id"].as_str().unwrap();
    let (status, body) = h
        .json(
            "PUT",
            &format!("/api/applications/{id}"),
            json!({ "fields": { "loanType": "sba-loan" } }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn draft_application_merges_fields() {
    let h = harness();
    let (_, record) = h
        .json(
            "POST",
            "/api/applications",
            json!({ "fields": { "loanType": "business-loan" } }),
        )
        .await;
    let id = record["id"].as_str().unwrap();
    let (status, record) = h
        .json(
            "PUT",
            &format!("/api/applications/{id}"),
            json!({ "fields": { "fundingAmount": 25000 } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["fields"]["loanType"], "business-loan");
    assert_eq!(record["fields"]["fundingAmount"], 25000.0);
}

#[tokio::test]
async fn application_with_unknown_field_is_rejected() {
    let h = harness();
    let (status, _) = h
        .json(
            "POST",
            "/api/applications",
            json!({ "fields": { "shoeSize": 11 } }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn missing_application_is_not_found() {
    let h = harness();
    let (status, _) = h
        .get("/api/applications/6f1c2d3e-0000-4000-8000-000000000000")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// -- Users ----------------------------------------------------------------------

#[tokio::test]
async fn upsert_is_keyed_by_normalized_email() {
    let h = harness();
    let (status, first) = h
        .json(
            "POST",
            "/api/users/upsert",
            json!({ "userData": { "email": " Ada@Example.com ", "firstName": "Ada" } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{first}");
    assert_eq!(first["success"], true);
    assert_eq!(first["user"]["email"], "ada@example.com");

    let (_, second) = h
        .json(
            "POST",
            "/api/users/upsert",
            json!({ "userData": { "email": "ada@example.com", "phone": "555-0100" } }),
        )
        .await;
    assert_eq!(second["user"]["id"], first["user"]["id"]);
    assert_eq!(second["user"]["firstName"], "Ada");
    assert_eq!(second["user"]["phone"], "555-0100");
    assert_eq!(h.repo.user_count(), 1);
}

#[tokio::test]
async fn upsert_links_the_application() {
    let h = harness();
    let (_, record) = h
        .json(
            "POST",
            "/api/applications",
            json!({ "fields": { "loanType": "business-loan" } }),
        )
        .await;
    let app_id = record["id"].as_str().unwrap();
    let (status, body) = h
        .json(
            "POST",
            "/api/users/upsert",
            json!({ "userData": { "email": "ada@example.com" }, "applicationId": app_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["applicationId"], app_id);

    let (_, record) = h.get(&format!("/api/applications/{app_id}")).await;
    assert_eq!(record["userId"], body["user"]["id"]);
}

#[tokio::test]
async fn upsert_for_unknown_application_saves_nothing() {
    let h = harness();
    let (status, body) = h
        .json(
            "POST",
            "/api/users/upsert",
            json!({
                "userData": { "email": "ada@example.com" },
                "applicationId": "6f1c2d3e-0000-4000-8000-000000000000",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{body}");
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(h.repo.user_count(), 0);
}

#[tokio::test]
async fn upsert_requires_a_valid_email() {
    let h = harness();
    let (status, body) = h
        .json(
            "POST",
            "/api/users/upsert",
            json!({ "userData": { "email": "nobody" } }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(h.repo.user_count(), 0);
}

// -- Uploads --------------------------------------------------------------------

#[tokio::test]
async fn oversized_upload_never_reaches_storage() {
    let h = harness();
    let request = multipart_upload("application/pdf", &pdf_of_size(15 * 1024 * 1024), None);
    let (status, body) = h.send(request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
    assert_eq!(h.stores.load(Ordering::SeqCst), 0);
    assert_eq!(h.repo.bank_statement_count(), 0);
}

#[tokio::test]
async fn pdf_upload_is_stored_and_served() {
    let h = harness();
    let request = multipart_upload("application/pdf", &pdf_of_size(5 * 1024 * 1024), None);
    let (status, body) = h.send(request).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["fileName"], "statement.pdf");
    assert_eq!(body["fileSize"], 5 * 1024 * 1024);
    assert_eq!(body["mimeType"], "application/pdf");
    assert_eq!(body["applicationUploadId"], body["id"]);
    assert_eq!(h.stores.load(Ordering::SeqCst), 1);
    assert_eq!(h.repo.bank_statement_count(), 1);

    let url = body["fileUrl"].as_str().unwrap();
    let path = url.strip_prefix("http://localhost:8080").unwrap();
    assert!(path.starts_with("/uploads/"));
    let response = h
        .app
        .clone()
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn non_pdf_upload_is_unsupported() {
    let h = harness();
    let request = multipart_upload("text/plain", b"hello", None);
    let (status, body) = h.send(request).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"]["code"], "UNSUPPORTED_MEDIA_TYPE");
    assert_eq!(h.stores.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn upload_with_bad_application_id_is_rejected() {
    let h = harness();
    let request = multipart_upload("application/pdf", &pdf_of_size(64), Some("not-a-uuid"));
    let (status, _) = h.send(request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(h.stores.load(Ordering::SeqCst), 0);
}

// -- Compliance -----------------------------------------------------------------

#[tokio::test]
async fn unreachable_website_still_completes_the_check() {
    let h = harness();
    let app_id = "6f1c2d3e-0000-4000-8000-0000000000aa";
    let (status, body) = h
        .json(
            "POST",
            "/api/compliance/website-check",
            json!({ "businessWebsite": "acme.example", "businessName": "Acme", "applicationId": app_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["metadata"]["reachable"], false);
    let score = body["riskScore"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&score));

    let (status, body) = h
        .json(
            "POST",
            "/api/compliance/website-check",
            json!({ "businessWebsite": "not a url", "applicationId": app_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["status"], "failed");
    assert!(body["errorMessage"].is_string());

    let (_, body) = h
        .get(&format!("/api/compliance/get-checks?applicationId={app_id}"))
        .await;
    let statuses: Vec<&str> = body["checks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["completed", "failed"]);
}

#[tokio::test]
async fn blank_website_is_a_validation_error() {
    let h = harness();
    let (status, _) = h
        .json(
            "POST",
            "/api/compliance/website-check",
            json!({ "businessWebsite": "  ", "applicationId": "6f1c2d3e-0000-4000-8000-0000000000aa" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// -- Metrics and OpenAPI --------------------------------------------------------

#[tokio::test]
async fn metrics_endpoint_reports_requests_and_sessions() {
    let h = harness();
    h.open_session().await;
    h.get("/api/steps").await;

    let response = h
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("intake_http_requests_total"));
    assert!(text.contains("intake_sessions_open 1"));
}

#[tokio::test]
async fn openapi_document_is_served() {
    let h = harness();
    let (status, body) = h.get("/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/sessions/{id}/advance"].is_object());
}

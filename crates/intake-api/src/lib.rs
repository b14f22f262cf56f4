//! # intake-api: Loan Application Intake Service
//!
//! Axum service behind the multi-step loan application form. Sessions hold
//! the wizard state and its snapshot; step completions persist the
//! application and hand side effects (applicant upsert, website check) to a
//! background dispatcher.
//!
//! ## API Surface
//!
//! | Prefix                    | Module                        |
//! |---------------------------|-------------------------------|
//! | `/api/steps`              | [`routes::steps`]             |
//! | `/api/sessions/*`         | [`routes::sessions`]          |
//! | `/api/applications/*`     | [`routes::applications`]      |
//! | `/api/users/upsert`       | [`routes::users`]             |
//! | `/api/bank-statement`     | [`routes::bank_statements`]   |
//! | `/api/compliance/*`       | [`routes::compliance`]        |
//! | `/uploads/*`              | stored files                  |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! CorsLayer → TraceLayer → MetricsMiddleware → BodyLimit → Handler
//! ```

pub mod config;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod records;
pub mod routes;
pub mod session;
pub mod state;
pub mod uploads;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::{Extension, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::middleware::metrics::ApiMetrics;
use crate::state::AppState;

/// Default request body cap. The upload route overrides it.
const BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Assemble the full router.
///
/// Health probes and `/metrics` are mounted outside the API middleware so
/// they do not count towards request metrics.
pub fn app(state: AppState) -> Router {
    let metrics = state.metrics.clone();
    let metrics_on = state.config.metrics_enabled;

    let mut api = Router::new()
        .merge(routes::steps::router())
        .merge(routes::sessions::router())
        .merge(routes::applications::router())
        .merge(routes::users::router())
        .merge(routes::bank_statements::router())
        .merge(routes::compliance::router())
        .merge(openapi::router())
        .layer(DefaultBodyLimit::max(BODY_LIMIT));

    if metrics_on {
        api = api
            .layer(from_fn(middleware::metrics::metrics_middleware))
            .layer(Extension(metrics.clone()));
    }

    let api = api
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let mut unauthenticated = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    if metrics_on {
        unauthenticated = unauthenticated
            .route("/metrics", axum::routing::get(prometheus_metrics))
            .layer(Extension(metrics));
    }

    let router = Router::new()
        .merge(unauthenticated.with_state(state.clone()))
        .merge(api);

    match cors_layer(state.config.cors_origin.as_deref()) {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

/// `*` allows any origin; anything else must be a single valid origin.
fn cors_layer(origin: Option<&str>) -> Option<CorsLayer> {
    let origin = origin?;
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);
    if origin == "*" {
        return Some(layer.allow_origin(Any));
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => Some(layer.allow_origin(value)),
        Err(e) => {
            tracing::warn!(origin, error = %e, "ignoring invalid CORS origin");
            None
        }
    }
}

/// GET /metrics: Prometheus scrape endpoint.
///
/// Refreshes the open-session gauge, then encodes every metric.
async fn prometheus_metrics(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
) -> impl IntoResponse {
    metrics.sessions_open().set(state.sessions.len() as f64);

    match metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode Prometheus metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

/// Liveness probe. 200 while the process runs.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. 200 "ready" once the repository answers, else 503.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Err(e) = state.repository.ping().await {
        tracing::warn!("Repository health check failed: {e}");
        return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
    }
    (StatusCode::OK, "ready").into_response()
}

//! # Prometheus Metrics
//!
//! HTTP request counts, latency, and errors are recorded by
//! [`metrics_middleware`]. Domain counters (side-effect failures, uploads,
//! website checks) are pushed by the code that observes them. The open
//! sessions gauge is refreshed on each `/metrics` scrape (pull model), see
//! the metrics handler in `lib.rs`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use prometheus::core::Collector;
use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,

    // -- HTTP middleware metrics --
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_errors_total: IntCounterVec,

    // -- Domain counters --
    side_effect_failures_total: IntCounterVec,
    side_effects_total: IntCounterVec,
    uploads_total: IntCounterVec,
    website_checks_total: IntCounterVec,

    // -- Pull-model gauges --
    sessions_open: Gauge,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("requests", &self.requests())
            .field("errors", &self.errors())
            .finish()
    }
}

fn counter(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let metric = IntCounterVec::new(Opts::new(name, help), labels).expect("metric can be created");
    registry
        .register(Box::new(metric.clone()))
        .expect("metric can be registered");
    metric
}

fn sum(metric: &IntCounterVec) -> u64 {
    metric
        .collect()
        .iter()
        .flat_map(|mf| mf.get_metric())
        .map(|m| m.get_counter().get_value() as u64)
        .sum()
}

impl ApiMetrics {
    /// Create a new metrics instance with a fresh Prometheus registry.
    pub fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = counter(
            &registry,
            "intake_http_requests_total",
            "Total HTTP requests",
            &["method", "path", "status"],
        );
        let http_errors_total = counter(
            &registry,
            "intake_http_errors_total",
            "Total HTTP errors (4xx and 5xx)",
            &["method", "path", "status"],
        );

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "intake_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "path"],
        )
        .expect("metric can be created");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("metric can be registered");

        let side_effects_total = counter(
            &registry,
            "intake_side_effects_total",
            "Side effects executed, by effect",
            &["effect"],
        );
        let side_effect_failures_total = counter(
            &registry,
            "intake_side_effect_failures_total",
            "Side effects that failed or were dropped, by effect",
            &["effect"],
        );
        let uploads_total = counter(
            &registry,
            "intake_bank_statement_uploads_total",
            "Bank statement uploads, by outcome",
            &["outcome"],
        );
        let website_checks_total = counter(
            &registry,
            "intake_website_checks_total",
            "Website compliance checks, by final status",
            &["status"],
        );

        let sessions_open = Gauge::new("intake_sessions_open", "Wizard sessions held in memory")
            .expect("metric can be created");
        registry
            .register(Box::new(sessions_open.clone()))
            .expect("metric can be registered");

        Self {
            inner: Arc::new(Inner {
                registry,
                http_requests_total,
                http_request_duration_seconds,
                http_errors_total,
                side_effect_failures_total,
                side_effects_total,
                uploads_total,
                website_checks_total,
                sessions_open,
            }),
        }
    }

    /// Total request count across all labels.
    pub fn requests(&self) -> u64 {
        sum(&self.inner.http_requests_total)
    }

    /// Total error count across all labels.
    pub fn errors(&self) -> u64 {
        sum(&self.inner.http_errors_total)
    }

    /// Total side-effect failures across all effects.
    pub fn side_effect_failures(&self) -> u64 {
        sum(&self.inner.side_effect_failures_total)
    }

    fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();

        self.inner
            .http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);

        if status >= 400 {
            self.inner
                .http_errors_total
                .with_label_values(&[method, path, &status_str])
                .inc();
        }
    }

    /// Count a side effect that ran to completion.
    pub fn record_side_effect(&self, effect: &str) {
        self.inner
            .side_effects_total
            .with_label_values(&[effect])
            .inc();
    }

    /// Count a side effect that failed or could not be enqueued.
    pub fn record_side_effect_failure(&self, effect: &str) {
        self.inner
            .side_effect_failures_total
            .with_label_values(&[effect])
            .inc();
    }

    /// Count an upload by outcome (`accepted`, `too_large`, `unsupported_type`, …).
    pub fn record_upload(&self, outcome: &str) {
        self.inner.uploads_total.with_label_values(&[outcome]).inc();
    }

    /// Count a resolved website check.
    pub fn record_website_check(&self, status: &str) {
        self.inner
            .website_checks_total
            .with_label_values(&[status])
            .inc();
    }

    /// Access the open sessions gauge for updating.
    pub fn sessions_open(&self) -> &Gauge {
        &self.inner.sessions_open
    }

    /// Gather all metrics and encode to Prometheus text format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer)
            .map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace UUID path segments with `{id}` to bound label cardinality.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.len() == 36
                && segment.chars().enumerate().all(|(i, c)| {
                    if i == 8 || i == 13 || i == 18 || i == 23 {
                        c == '-'
                    } else {
                        c.is_ascii_hexdigit()
                    }
                })
            {
                "{id}"
            } else if segment.len() == 32 && segment.chars().all(|c| c.is_ascii_hexdigit()) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Middleware that records HTTP request metrics.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());
    let start = Instant::now();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        let duration = start.elapsed().as_secs_f64();
        m.record_request(&method, &path, response.status().as_u16(), duration);
    }

    response
}

//! # HTTP Page Fetcher Integration Tests
//!
//! Drives `HttpPageFetcher` and the full `WebsiteCheckService` pipeline
//! against wiremock servers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use intake_compliance::{
    normalize_url, CheckStatus, CheckStore, CheckStoreError, ComplianceCheck, FetchError,
    HttpPageFetcher, PageFetcher, WebsiteCheckRequest, WebsiteCheckService,
};
use intake_core::ApplicationId;
use parking_lot::Mutex;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct MemoryChecks(Mutex<Vec<ComplianceCheck>>);

#[async_trait]
impl CheckStore for MemoryChecks {
    async fn insert_check(&self, check: &ComplianceCheck) -> Result<(), CheckStoreError> {
        self.0.lock().push(check.clone());
        Ok(())
    }

    async fn update_check(&self, check: &ComplianceCheck) -> Result<(), CheckStoreError> {
        let mut checks = self.0.lock();
        match checks.iter_mut().find(|c| c.id == check.id) {
            Some(slot) => {
                *slot = check.clone();
                Ok(())
            }
            None => Err(CheckStoreError(format!("unknown check {}", check.id))),
        }
    }
}

const HOMEPAGE: &str = r#"<html><head>
<title>Acme Bakery</title>
<meta name="description" content="Bread">
</head><body>
<a href="mailto:hello@acmebakery.com">mail</a>
<a href="tel:+15550100">call</a>
<a href="https://www.linkedin.com/company/acme">in</a>
</body></html>"#;

#[tokio::test]
async fn fetches_html_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_string(HOMEPAGE))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpPageFetcher::new().expect("client");
    let url = normalize_url(&server.uri()).expect("url");
    let page = fetcher.fetch(&url).await.expect("fetch");
    assert_eq!(page.status, 200);
    assert!(page.body.contains("Acme Bakery"));
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = HttpPageFetcher::new().expect("client");
    let url = normalize_url(&server.uri()).expect("url");
    let err = fetcher.fetch(&url).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn slow_site_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let fetcher = HttpPageFetcher::with_timeout(Duration::from_millis(200)).expect("client");
    let url = normalize_url(&server.uri()).expect("url");
    let err = fetcher.fetch(&url).await.unwrap_err();
    assert!(matches!(err, FetchError::Http { .. }));
}

#[tokio::test]
async fn service_scores_live_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(HOMEPAGE))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryChecks::default());
    let service = WebsiteCheckService::new(
        Arc::new(HttpPageFetcher::new().expect("client")),
        store.clone(),
    );
    let outcome = service
        .run(&WebsiteCheckRequest {
            business_website: server.uri(),
            business_name: Some("Acme Bakery".into()),
            application_id: ApplicationId::new(),
        })
        .await
        .expect("run");

    // Every signal present plus LinkedIn: clamped at zero.
    assert_eq!(outcome.risk_score(), Some(0.0));
    let stored = store.0.lock();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, CheckStatus::Completed);
}

#[tokio::test]
async fn service_marks_unreachable_site() {
    // No mocks mounted: every request gets a 404.
    let server = MockServer::start().await;

    let store = Arc::new(MemoryChecks::default());
    let service = WebsiteCheckService::new(
        Arc::new(HttpPageFetcher::with_timeout(Duration::from_secs(2)).expect("client")),
        store.clone(),
    );
    let outcome = service
        .run(&WebsiteCheckRequest {
            business_website: server.uri(),
            business_name: None,
            application_id: ApplicationId::new(),
        })
        .await
        .expect("run");

    assert!(outcome.risk_score().expect("score") >= 0.3);
    let metadata = outcome.metadata.expect("metadata");
    assert!(!metadata.reachable);
    assert_eq!(metadata.status_code, Some(404));
}

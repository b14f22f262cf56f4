//! # Address Client Integration Tests
//!
//! Exercises `AddressClient` against a wiremock server: query construction,
//! response mapping, and error handling.

use intake_client::{AddressClient, AddressClientConfig, AddressLookup, GeocodeError};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> AddressClient {
    let config = AddressClientConfig::new("test-key").with_base_url(server.uri());
    AddressClient::new(config).expect("client build")
}

#[tokio::test]
async fn suggest_maps_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/geocode/autocomplete"))
        .and(query_param("text", "1 Main"))
        .and(query_param("apiKey", "test-key"))
        .and(query_param("format", "json"))
        .and(query_param("filter", "countrycode:us"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                {
                    "formatted": "1 Main St, Springfield, IL 62701, United States of America",
                    "address_line1": "1 Main St",
                    "city": "Springfield",
                    "state": "Illinois",
                    "state_code": "IL",
                    "postcode": "62701",
                    "country_code": "us",
                    "lat": 39.8,
                    "lon": -89.6
                },
                { "city": "No label" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let suggestions = client(&server).suggest("  1 Main ").await.expect("suggest");
    assert_eq!(suggestions.len(), 1);
    let s = &suggestions[0];
    assert_eq!(s.street_address.as_deref(), Some("1 Main St"));
    assert_eq!(s.city.as_deref(), Some("Springfield"));
    assert_eq!(s.state.as_deref(), Some("IL"));
    assert_eq!(s.postcode.as_deref(), Some("62701"));
}

#[tokio::test]
async fn blank_text_skips_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let suggestions = client(&server).suggest("   ").await.expect("suggest");
    assert!(suggestions.is_empty());
}

#[tokio::test]
async fn api_error_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/geocode/autocomplete"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid apiKey"))
        .mount(&server)
        .await;

    match client(&server).suggest("1 Main").await {
        Err(GeocodeError::Api { status, body, .. }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "Invalid apiKey");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_body_is_deserialization_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    assert!(matches!(
        client(&server).suggest("1 Main").await,
        Err(GeocodeError::Deserialization { .. })
    ));
}

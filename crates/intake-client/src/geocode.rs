//! # Address Autocomplete Client
//!
//! Wraps a `reqwest::Client` with the API base URL and key. The client is
//! `Send + Sync` and meant to be shared via `Arc`.
//!
//! Retries are not built in. A lookup is interactive: a stale answer is
//! worse than none.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::GeocodeError;

/// Default public endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.geoapify.com";

/// Configuration for [`AddressClient`].
#[derive(Debug, Clone)]
pub struct AddressClientConfig {
    pub base_url: String,
    pub api_key: String,
    /// Request timeout in seconds (default: 5).
    pub timeout_secs: u64,
    /// Maximum suggestions per lookup (default: 5).
    pub limit: u8,
    /// ISO country filter, e.g. `us`.
    pub country_code: Option<String>,
}

impl AddressClientConfig {
    /// Configuration against the public endpoint, restricted to the US.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            timeout_secs: 5,
            limit: 5,
            country_code: Some("us".to_string()),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// One address candidate, shaped for filling the address steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddressSuggestion {
    pub formatted: String,
    pub street_address: Option<String>,
    pub city: Option<String>,
    /// Two-letter state code when available, otherwise the state name.
    pub state: Option<String>,
    pub postcode: Option<String>,
    pub country_code: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct AutocompleteResponse {
    #[serde(default)]
    results: Vec<AutocompleteResult>,
}

#[derive(Debug, Deserialize)]
struct AutocompleteResult {
    formatted: Option<String>,
    address_line1: Option<String>,
    city: Option<String>,
    state: Option<String>,
    state_code: Option<String>,
    postcode: Option<String>,
    country_code: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl AutocompleteResult {
    fn into_suggestion(self) -> Option<AddressSuggestion> {
        let formatted = self.formatted.or_else(|| self.address_line1.clone())?;
        Some(AddressSuggestion {
            formatted,
            street_address: self.address_line1,
            city: self.city,
            state: self.state_code.map(|s| s.to_ascii_uppercase()).or(self.state),
            postcode: self.postcode,
            country_code: self.country_code,
            lat: self.lat,
            lon: self.lon,
        })
    }
}

/// Anything that can turn partial input into address candidates.
#[async_trait]
pub trait AddressLookup: Send + Sync {
    async fn suggest(&self, text: &str) -> Result<Vec<AddressSuggestion>, GeocodeError>;
}

/// HTTP client for the autocomplete endpoint.
#[derive(Debug, Clone)]
pub struct AddressClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    limit: u8,
    country_code: Option<String>,
}

impl AddressClient {
    pub fn new(config: AddressClientConfig) -> Result<Self, GeocodeError> {
        if config.api_key.trim().is_empty() {
            return Err(GeocodeError::NotConfigured {
                reason: "empty API key".into(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GeocodeError::NotConfigured {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            limit: config.limit.max(1),
            country_code: config.country_code,
        })
    }
}

#[async_trait]
impl AddressLookup for AddressClient {
    async fn suggest(&self, text: &str) -> Result<Vec<AddressSuggestion>, GeocodeError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let endpoint = format!("{}/v1/geocode/autocomplete", self.base_url);
        let limit = self.limit.to_string();
        let filter = self
            .country_code
            .as_ref()
            .map(|c| format!("countrycode:{}", c.to_ascii_lowercase()));

        let mut query: Vec<(&str, &str)> = vec![
            ("text", text),
            ("format", "json"),
            ("limit", limit.as_str()),
            ("apiKey", self.api_key.as_str()),
        ];
        if let Some(filter) = filter.as_deref() {
            query.push(("filter", filter));
        }

        let resp = self
            .client
            .get(&endpoint)
            .query(&query)
            .send()
            .await
            .map_err(|source| GeocodeError::Http {
                endpoint: endpoint.clone(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GeocodeError::Api {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: AutocompleteResponse = resp.json().await.map_err(|source| {
            GeocodeError::Deserialization {
                endpoint: endpoint.clone(),
                source,
            }
        })?;

        let suggestions: Vec<_> = parsed
            .results
            .into_iter()
            .filter_map(AutocompleteResult::into_suggestion)
            .collect();
        tracing::debug!(count = suggestions.len(), "address suggestions");
        Ok(suggestions)
    }
}

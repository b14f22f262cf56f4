//! # Page Fetching
//!
//! [`PageFetcher`] is the network seam of the website check.
//! [`HttpPageFetcher`] is the reqwest implementation: a per-request timeout,
//! redirects followed, no retries. Callers treat any error as "unreachable".

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Default fetch timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default `User-Agent` sent with fetches.
pub const DEFAULT_USER_AGENT: &str = "intake-compliance/0.1 (+website-check)";

/// Bodies larger than this are truncated before extraction.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Errors from URL normalization and fetching.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The URL could not be normalized.
    #[error("invalid website URL {input:?}: {reason}")]
    InvalidUrl {
        /// The raw input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Transport failure or timeout.
    #[error("HTTP error fetching {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The site answered with a non-2xx status.
    #[error("{url} returned {status}")]
    Status {
        url: String,
        status: u16,
    },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    /// The HTTP status, when the site answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// Trim, prefix `https://` when no scheme is given, and require an http(s)
/// URL with a host.
pub fn normalize_url(input: &str) -> Result<Url, FetchError> {
    let trimmed = input.trim();
    let invalid = |reason: &str| FetchError::InvalidUrl {
        input: input.to_string(),
        reason: reason.to_string(),
    };
    if trimmed.is_empty() {
        return Err(invalid("empty"));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(invalid("contains whitespace"));
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&candidate).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    let host_ok = match url.host() {
        Some(url::Host::Domain(d)) => d.contains('.') || d == "localhost",
        Some(_) => true,
        None => false,
    };
    if !host_ok {
        return Err(invalid("missing or incomplete host"));
    }
    Ok(url)
}

/// Fetches a page's HTML.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GET `url`. Non-2xx responses are [`FetchError::Status`].
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;
}

/// reqwest-backed [`PageFetcher`].
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    /// Build with the default timeout and user agent.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Build with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let endpoint = url.to_string();
        let resp = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: endpoint.clone(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: endpoint,
                status: status.as_u16(),
            });
        }

        let final_url = resp.url().to_string();
        let bytes = resp.bytes().await.map_err(|source| FetchError::Http {
            url: endpoint.clone(),
            source,
        })?;
        let body = String::from_utf8_lossy(&bytes[..bytes.len().min(MAX_BODY_BYTES)]).into_owned();

        tracing::debug!(url = %final_url, status = status.as_u16(), bytes = bytes.len(), "fetched page");
        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_domain_gets_https() {
        let u = normalize_url("  acmebakery.com ").unwrap();
        assert_eq!(u.as_str(), "https://acmebakery.com/");
    }

    #[test]
    fn explicit_http_is_kept() {
        let u = normalize_url("http://acme.test/about").unwrap();
        assert_eq!(u.scheme(), "http");
        assert_eq!(u.path(), "/about");
    }

    #[test]
    fn localhost_and_ip_hosts_are_accepted() {
        assert!(normalize_url("http://localhost:8080").is_ok());
        assert!(normalize_url("http://127.0.0.1:9000/").is_ok());
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "   ", "not a url", "ftp://acme.test", "https://", "acme"] {
            assert!(
                matches!(normalize_url(bad), Err(FetchError::InvalidUrl { .. })),
                "{bad:?} should be rejected"
            );
        }
    }
}

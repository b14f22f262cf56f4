//! Address client error types.

/// Errors from address lookups.
#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The API returned a non-2xx status.
    #[error("geocoding API {endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
    /// Missing key or unusable base URL.
    #[error("geocoding is not configured: {reason}")]
    NotConfigured { reason: String },
    /// A newer lookup replaced this one before the quiet window elapsed.
    #[error("lookup superseded by a newer request")]
    Superseded,
}

impl From<crate::debounce::Superseded> for GeocodeError {
    fn from(_: crate::debounce::Superseded) -> Self {
        Self::Superseded
    }
}

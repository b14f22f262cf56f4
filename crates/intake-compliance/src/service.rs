//! # Website Check Service
//!
//! Runs one check end to end: create the pending record, fetch, score,
//! persist the resolution. An invalid URL fails the check. An unreachable
//! site still completes it, with the unreachable penalty applied.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use intake_core::ApplicationId;

use crate::check::{CheckError, CheckType, ComplianceCheck};
use crate::fetch::{normalize_url, PageFetcher};
use crate::metadata::{extract_metadata, WebsiteMetadata};
use crate::score::risk_score;

/// Persistence failure reported by a [`CheckStore`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("compliance check store error: {0}")]
pub struct CheckStoreError(pub String);

/// Where checks are recorded.
#[async_trait]
pub trait CheckStore: Send + Sync {
    /// Record a new check.
    async fn insert_check(&self, check: &ComplianceCheck) -> Result<(), CheckStoreError>;
    /// Replace a check's status, score, payload and error.
    async fn update_check(&self, check: &ComplianceCheck) -> Result<(), CheckStoreError>;
}

/// Errors from [`WebsiteCheckService::run`].
#[derive(Error, Debug)]
pub enum WebsiteCheckError {
    #[error(transparent)]
    Store(#[from] CheckStoreError),
    #[error(transparent)]
    Lifecycle(#[from] CheckError),
}

/// Input to a website check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteCheckRequest {
    pub business_website: String,
    #[serde(default)]
    pub business_name: Option<String>,
    #[schema(value_type = String, format = Uuid)]
    pub application_id: ApplicationId,
}

/// Result of a website check.
#[derive(Debug, Clone, PartialEq)]
pub struct WebsiteCheckOutcome {
    /// The resolved check as persisted.
    pub check: ComplianceCheck,
    /// Present when the check completed.
    pub metadata: Option<WebsiteMetadata>,
}

impl WebsiteCheckOutcome {
    /// Score of a completed check.
    pub fn risk_score(&self) -> Option<f64> {
        self.check.risk_score
    }
}

/// Drives website checks.
#[derive(Clone)]
pub struct WebsiteCheckService {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn CheckStore>,
}

impl std::fmt::Debug for WebsiteCheckService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebsiteCheckService").finish_non_exhaustive()
    }
}

impl WebsiteCheckService {
    pub fn new(fetcher: Arc<dyn PageFetcher>, store: Arc<dyn CheckStore>) -> Self {
        Self { fetcher, store }
    }

    /// Run a check for `request` and return the resolved record.
    pub async fn run(
        &self,
        request: &WebsiteCheckRequest,
    ) -> Result<WebsiteCheckOutcome, WebsiteCheckError> {
        let mut check = ComplianceCheck::pending(request.application_id, CheckType::WebsiteCheck);
        self.store.insert_check(&check).await?;

        let url = match normalize_url(&request.business_website) {
            Ok(url) => url,
            Err(e) => {
                tracing::info!(
                    check_id = %check.id,
                    application_id = %request.application_id,
                    error = %e,
                    "website check failed"
                );
                check.fail(e.to_string())?;
                self.store.update_check(&check).await?;
                return Ok(WebsiteCheckOutcome {
                    check,
                    metadata: None,
                });
            }
        };

        let metadata = match self.fetcher.fetch(&url).await {
            Ok(page) => extract_metadata(&page.url, Some(page.status), &page.body),
            Err(e) => {
                tracing::warn!(check_id = %check.id, url = %url, error = %e, "website unreachable");
                WebsiteMetadata::unreachable(url.as_str(), e.status())
            }
        };

        let score = risk_score(metadata.reachable, &metadata);
        let payload = serde_json::json!({
            "businessName": request.business_name,
            "metadata": metadata,
        });
        check.complete(score, payload)?;
        self.store.update_check(&check).await?;

        tracing::info!(
            check_id = %check.id,
            application_id = %request.application_id,
            risk_score = score,
            reachable = metadata.reachable,
            "website check completed"
        );
        Ok(WebsiteCheckOutcome {
            check,
            metadata: Some(metadata),
        })
    }
}

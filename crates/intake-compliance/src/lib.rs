//! # intake-compliance: Website Compliance Check
//!
//! A heuristic risk assessment of an applicant's business website.
//!
//! ```text
//!   businessWebsite ──▶ normalize_url ──▶ PageFetcher ──▶ extract_metadata
//!                                                              │
//!                   ComplianceCheck (pending) ◀── risk_score ◀─┘
//!                          │
//!                 complete(score, payload) | fail(message)
//! ```
//!
//! [`WebsiteCheckService`] drives the pipeline and persists each check
//! through a [`CheckStore`]. Network access sits behind [`PageFetcher`] so
//! the pipeline can be exercised without a live site.

pub mod check;
pub mod fetch;
pub mod metadata;
pub mod score;
pub mod service;

pub use check::{CheckError, CheckStatus, CheckType, ComplianceCheck};
pub use fetch::{normalize_url, FetchError, FetchedPage, HttpPageFetcher, PageFetcher};
pub use metadata::{extract_metadata, SocialLinks, WebsiteMetadata};
pub use score::risk_score;
pub use service::{
    CheckStore, CheckStoreError, WebsiteCheckError, WebsiteCheckOutcome, WebsiteCheckRequest,
    WebsiteCheckService,
};

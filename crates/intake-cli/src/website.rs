//! # Check-Website Subcommand
//!
//! Runs the same fetch, extraction and scoring as a compliance check, but
//! prints the result instead of recording it.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use intake_compliance::{
    extract_metadata, normalize_url, risk_score, HttpPageFetcher, PageFetcher, WebsiteMetadata,
};

/// Arguments for `intake check-website`.
#[derive(Args, Debug)]
pub struct WebsiteArgs {
    /// Website as an applicant would type it; `https://` is assumed.
    #[arg(value_name = "URL")]
    pub url: String,

    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,

    /// Print JSON instead of a summary.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteReport {
    pub risk_score: f64,
    pub metadata: WebsiteMetadata,
}

pub fn run_check_website(args: &WebsiteArgs) -> Result<u8> {
    let url = match normalize_url(&args.url) {
        Ok(url) => url,
        Err(e) => {
            println!("FAIL: {e}");
            return Ok(1);
        }
    };
    let fetcher = HttpPageFetcher::with_timeout(Duration::from_secs(args.timeout_secs))?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    let report = runtime.block_on(check(&fetcher, &url));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", summary(&report));
    }
    Ok(0)
}

/// Fetch and score `url`. Unreachable sites still produce a report.
pub async fn check(fetcher: &dyn PageFetcher, url: &url::Url) -> WebsiteReport {
    let metadata = match fetcher.fetch(url).await {
        Ok(page) => extract_metadata(&page.url, Some(page.status), &page.body),
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "website unreachable");
            WebsiteMetadata::unreachable(url.as_str(), e.status())
        }
    };
    WebsiteReport {
        risk_score: risk_score(metadata.reachable, &metadata),
        metadata,
    }
}

fn summary(report: &WebsiteReport) -> String {
    let m = &report.metadata;
    let mut out = format!(
        "{}\n  reachable:  {}\n  risk score: {:.2}\n",
        m.url, m.reachable, report.risk_score
    );
    if let Some(title) = &m.title {
        out.push_str(&format!("  title:      {title}\n"));
    }
    if !m.emails.is_empty() {
        out.push_str(&format!("  emails:     {}\n", m.emails.join(", ")));
    }
    if !m.phones.is_empty() {
        out.push_str(&format!("  phones:     {}\n", m.phones.join(", ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use intake_compliance::{FetchError, FetchedPage};

    use super::*;

    struct Fixed(Option<&'static str>);

    #[async_trait]
    impl PageFetcher for Fixed {
        async fn fetch(&self, url: &url::Url) -> Result<FetchedPage, FetchError> {
            match self.0 {
                Some(body) => Ok(FetchedPage {
                    url: url.to_string(),
                    status: 200,
                    body: body.to_string(),
                }),
                None => Err(FetchError::Status {
                    url: url.to_string(),
                    status: 503,
                }),
            }
        }
    }

    #[tokio::test]
    async fn reachable_page_is_scored_from_its_metadata() {
        let url = normalize_url("acme.example").unwrap();
        let html = r#"<html><head><title>Acme</title></head>
            <body><a href="mailto:hello@acme.example">mail</a></body></html>"#;
        let report = check(&Fixed(Some(html)), &url).await;
        assert!(report.metadata.reachable);
        assert_eq!(report.metadata.title.as_deref(), Some("Acme"));
        assert!((0.0..=1.0).contains(&report.risk_score));
        assert!(summary(&report).contains("title:      Acme"));
    }

    #[tokio::test]
    async fn unreachable_page_keeps_the_status() {
        let url = normalize_url("down.example").unwrap();
        let report = check(&Fixed(None), &url).await;
        assert!(!report.metadata.reachable);
        assert_eq!(report.metadata.status_code, Some(503));
        assert!((0.0..=1.0).contains(&report.risk_score));
    }
}

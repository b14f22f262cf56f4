//! # Page Metadata Extraction
//!
//! Pulls the signals the risk score uses out of raw HTML. Pattern-based:
//! the input is untrusted markup, so extraction never fails, it only finds
//! less.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Social profile links found on a page. First match per network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SocialLinks {
    pub linkedin: Option<String>,
    pub facebook: Option<String>,
    pub twitter: Option<String>,
    pub instagram: Option<String>,
}

impl SocialLinks {
    /// Whether no network was found.
    pub fn is_empty(&self) -> bool {
        self.linkedin.is_none()
            && self.facebook.is_none()
            && self.twitter.is_none()
            && self.instagram.is_none()
    }
}

/// What a website check learned about a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteMetadata {
    /// The normalized URL that was fetched.
    pub url: String,
    /// Whether the page answered with a 2xx status.
    pub reachable: bool,
    /// HTTP status, when a response arrived.
    pub status_code: Option<u16>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Contact emails, lowercased, sorted, unique.
    pub emails: Vec<String>,
    /// Phone numbers from `tel:` links, sorted, unique.
    pub phones: Vec<String>,
    pub social_links: SocialLinks,
}

impl WebsiteMetadata {
    /// Metadata for a page that could not be fetched.
    pub fn unreachable(url: impl Into<String>, status_code: Option<u16>) -> Self {
        Self {
            url: url.into(),
            reachable: false,
            status_code,
            ..Self::default()
        }
    }
}

struct Patterns {
    title: Regex,
    meta: Regex,
    attr: Regex,
    email: Regex,
    tel: Regex,
    href: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        title: Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("static pattern"),
        meta: Regex::new(r"(?is)<meta\b[^>]*>").expect("static pattern"),
        attr: Regex::new(r#"(?is)([a-z:-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .expect("static pattern"),
        email: Regex::new(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b")
            .expect("static pattern"),
        tel: Regex::new(r#"(?i)href\s*=\s*["']tel:([^"']+)["']"#).expect("static pattern"),
        href: Regex::new(r#"(?i)href\s*=\s*["'](https?://[^"']+)["']"#)
            .expect("static pattern"),
    })
}

/// Collapse runs of whitespace and trim. `None` for blank input.
fn clean(s: &str) -> Option<String> {
    let joined = s.split_whitespace().collect::<Vec<_>>().join(" ");
    (!joined.is_empty()).then_some(joined)
}

fn meta_attributes(tag: &str) -> Vec<(String, String)> {
    patterns()
        .attr
        .captures_iter(tag)
        .filter_map(|c| {
            let name = c.get(1)?.as_str().to_ascii_lowercase();
            let value = c.get(2).or_else(|| c.get(3))?.as_str().to_string();
            Some((name, value))
        })
        .collect()
}

/// Meta description, falling back to `og:description`.
fn description(html: &str) -> Option<String> {
    let mut og = None;
    for tag in patterns().meta.find_iter(html) {
        let attrs = meta_attributes(tag.as_str());
        let key = attrs
            .iter()
            .find(|(n, _)| n == "name" || n == "property")
            .map(|(_, v)| v.to_ascii_lowercase());
        let content = attrs
            .iter()
            .find(|(n, _)| n == "content")
            .and_then(|(_, v)| clean(v));
        match key.as_deref() {
            Some("description") if content.is_some() => return content,
            Some("og:description") if og.is_none() => og = content,
            _ => {}
        }
    }
    og
}

fn classify_social(url: &str, links: &mut SocialLinks) {
    let host = match url::Url::parse(url) {
        Ok(u) => match u.host_str() {
            Some(h) => h.trim_start_matches("www.").to_ascii_lowercase(),
            None => return,
        },
        Err(_) => return,
    };
    let slot = match host.as_str() {
        "linkedin.com" | "lnkd.in" => &mut links.linkedin,
        "facebook.com" | "fb.com" | "m.facebook.com" => &mut links.facebook,
        "twitter.com" | "x.com" => &mut links.twitter,
        "instagram.com" => &mut links.instagram,
        h if h.ends_with(".linkedin.com") => &mut links.linkedin,
        _ => return,
    };
    if slot.is_none() {
        *slot = Some(url.to_string());
    }
}

/// Extract metadata from a fetched page body.
pub fn extract_metadata(url: &str, status_code: Option<u16>, html: &str) -> WebsiteMetadata {
    let p = patterns();

    let title = p
        .title
        .captures(html)
        .and_then(|c| c.get(1))
        .and_then(|m| clean(m.as_str()));

    let emails: BTreeSet<String> = p
        .email
        .find_iter(html)
        .map(|m| m.as_str().to_ascii_lowercase())
        .filter(|e| !e.ends_with(".png") && !e.ends_with(".jpg"))
        .collect();

    let phones: BTreeSet<String> = p
        .tel
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .filter_map(|m| clean(m.as_str()))
        .collect();

    let mut social_links = SocialLinks::default();
    for c in p.href.captures_iter(html) {
        if let Some(m) = c.get(1) {
            classify_social(m.as_str(), &mut social_links);
        }
    }

    WebsiteMetadata {
        url: url.to_string(),
        reachable: true,
        status_code,
        title,
        description: description(html),
        emails: emails.into_iter().collect(),
        phones: phones.into_iter().collect(),
        social_links,
    }
}

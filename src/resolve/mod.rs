//! Entity resolution: map a free-text query onto canonical records in the
//! policy-rubric catalog and the review-service catalog.
//!
//! - [`policy`] — exact / fuzzy lookup plus parent-chain traversal over the
//!   in-memory rubric catalog.
//! - [`review`] — delegated search against the review service, and the
//!   paginated enumeration that builds the master site list.
//! - [`fuzzy`] — similarity ratios used by the fuzzy step.
//!
//! Nothing fails past this boundary: every outcome is a [`Resolution`].

pub mod fuzzy;
pub mod policy;
pub mod review;

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::source::SourceError;

/// Outcome of resolving a query against one catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Resolution<T> {
    Resolved(T),
    NotFound,
    RateLimited,
    TransportFailure(String),
    Timeout,
    Cancelled,
    Malformed(String),
}

impl<T> Resolution<T> {
    pub fn resolved(&self) -> Option<&T> {
        match self {
            Resolution::Resolved(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

impl<T> From<SourceError> for Resolution<T> {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::RateLimited => Resolution::RateLimited,
            SourceError::Timeout => Resolution::Timeout,
            SourceError::Cancelled => Resolution::Cancelled,
            SourceError::Malformed(reason) => Resolution::Malformed(reason),
            SourceError::Database(err) => Resolution::Malformed(err.to_string()),
            SourceError::Transport(reason) => Resolution::TransportFailure(reason),
            SourceError::Status(code) => Resolution::TransportFailure(format!("HTTP {code}")),
        }
    }
}

fn url_host_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:[a-z][a-z0-9+.\-]*://)?(?:www\.)?([^/?#:\s]+)").expect("static regex")
    })
}

/// Trim a query and reduce pasted URLs (`https://www.acme.com/about`) to
/// their host (`acme.com`). Company names pass through with inner runs of
/// whitespace collapsed.
pub fn normalize_query(raw: &str) -> String {
    let trimmed = raw.trim();
    let looks_like_url = trimmed.contains("://") || trimmed.to_ascii_lowercase().starts_with("www.");
    if looks_like_url {
        if let Some(host) = url_host_re().captures(trimmed).and_then(|c| c.get(1)) {
            return host.as_str().to_ascii_lowercase();
        }
    }
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First whitespace-delimited token, lower-cased.
pub(crate) fn first_token(s: &str) -> String {
    s.split_whitespace().next().unwrap_or("").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_query_urls() {
        assert_eq!(normalize_query("https://www.Acme.com/about?x=1"), "acme.com");
        assert_eq!(normalize_query("  www.acme.com "), "acme.com");
        assert_eq!(normalize_query("http://acme.com:8080/"), "acme.com");
    }

    #[test]
    fn test_normalize_query_names() {
        assert_eq!(normalize_query("  Acme   Corp "), "Acme Corp");
        assert_eq!(normalize_query("acme.com"), "acme.com");
        assert_eq!(normalize_query(""), "");
    }

    #[test]
    fn test_first_token() {
        assert_eq!(first_token("Acme Corp"), "acme");
        assert_eq!(first_token("   "), "");
    }

    #[test]
    fn test_source_error_mapping() {
        let r: Resolution<()> = SourceError::RateLimited.into();
        assert_eq!(r, Resolution::RateLimited);
        let r: Resolution<()> = SourceError::Status(503).into();
        assert!(matches!(r, Resolution::TransportFailure(_)));
        let r: Resolution<()> = SourceError::Timeout.into();
        assert_eq!(r, Resolution::Timeout);
    }
}

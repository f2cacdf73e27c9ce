//! ToS;DR review service: fuzzy search, per-service detail and a paginated
//! listing of every reviewed service.
//!
//! Payloads are read through `serde_json::Value` because the service has
//! shipped several shapes for the same fields (ratings as a bare letter or as
//! an object, points flat or nested under `case`).

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;

use super::{Fetcher, SourceError};
use crate::config::SourcesConfig;
use crate::models::{Classification, Document, Rating, ReviewPoint, ReviewRecord};

/// One page of the service listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewPage {
    pub services: Vec<ReviewRecord>,
    pub current: u32,
    pub end: u32,
    /// Entries on this page that could not be read.
    pub skipped: usize,
}

/// Read access to the review catalog.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    /// Candidates returned by the service's own fuzzy search.
    async fn search(&self, query: &str) -> Result<Vec<ReviewRecord>, SourceError>;

    /// Full record (points, documents, image) for one service.
    async fn service(&self, id: u64) -> Result<ReviewRecord, SourceError>;

    /// One page of the full listing, 1-based.
    async fn page(&self, page: u32) -> Result<ReviewPage, SourceError>;
}

/// [`ReviewSource`] backed by the public HTTP API.
pub struct ReviewClient {
    fetcher: Fetcher,
    search_url: String,
    service_url: String,
    listing_url: String,
}

impl ReviewClient {
    pub fn new(fetcher: Fetcher, config: &SourcesConfig) -> Self {
        ReviewClient {
            fetcher,
            search_url: config.review_search_url.clone(),
            service_url: config.review_service_url.clone(),
            listing_url: config.review_listing_url.clone(),
        }
    }
}

fn with_param(base: &str, key: &str, value: &str) -> Result<String, SourceError> {
    let mut url = Url::parse(base).map_err(|e| SourceError::Transport(format!("bad url {base}: {e}")))?;
    url.query_pairs_mut().append_pair(key, value);
    Ok(url.into())
}

#[async_trait]
impl ReviewSource for ReviewClient {
    async fn search(&self, query: &str) -> Result<Vec<ReviewRecord>, SourceError> {
        let url = with_param(&self.search_url, "query", query)?;
        let body: Value = self.fetcher.get_json(&url).await?;
        let (services, skipped) = parse_services(&body)?;
        if skipped > 0 {
            tracing::debug!(query, skipped, "search returned unreadable entries");
        }
        Ok(services)
    }

    async fn service(&self, id: u64) -> Result<ReviewRecord, SourceError> {
        let url = with_param(&self.service_url, "id", &id.to_string())?;
        let body: Value = self.fetcher.get_json(&url).await?;
        parse_service(&body).ok_or_else(|| SourceError::Malformed(format!("service {id}")))
    }

    async fn page(&self, page: u32) -> Result<ReviewPage, SourceError> {
        let url = with_param(&self.listing_url, "page", &page.to_string())?;
        let body: Value = self.fetcher.get_json(&url).await?;
        parse_page(&body)
    }
}

// ---------------------------------------------------------------------------
// Payload parsing
// ---------------------------------------------------------------------------

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn string_list(value: &Value, key: &str) -> Vec<String> {
    match value.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        // Some payloads carry a single comma-separated string.
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_rating(value: &Value) -> Rating {
    match value.get("rating") {
        Some(Value::String(label)) => Rating::from_label(label),
        Some(obj @ Value::Object(_)) => str_field(obj, "letter")
            .or_else(|| str_field(obj, "human"))
            .map(Rating::from_label)
            .unwrap_or(Rating::NotAvailable),
        _ => Rating::NotAvailable,
    }
}

fn parse_point(value: &Value) -> Option<ReviewPoint> {
    let case = value.get("case").unwrap_or(value);
    let classification = str_field(case, "classification")
        .or_else(|| str_field(value, "classification"))
        .and_then(Classification::from_label)?;
    let title = str_field(case, "title").or_else(|| str_field(value, "title"))?;
    let description = str_field(case, "description")
        .or_else(|| str_field(value, "description"))
        .unwrap_or_default();
    Some(ReviewPoint {
        classification,
        title: title.to_string(),
        description: description.to_string(),
    })
}

fn parse_document(value: &Value) -> Option<Document> {
    let url = str_field(value, "url").filter(|u| !u.is_empty())?;
    Some(Document {
        name: str_field(value, "name").unwrap_or("Document").to_string(),
        url: url.to_string(),
    })
}

/// Read one service object. `None` when it lacks an id or a name.
pub fn parse_service(value: &Value) -> Option<ReviewRecord> {
    let id = value.get("id").and_then(|id| {
        id.as_u64()
            .or_else(|| id.as_str().and_then(|s| s.parse().ok()))
    })?;
    let name = str_field(value, "name")?.to_string();
    let slug = str_field(value, "slug")
        .map(str::to_string)
        .unwrap_or_else(|| name.to_lowercase().replace(' ', "-"));

    let points = value
        .get("points")
        .and_then(Value::as_array)
        .map(|points| points.iter().filter_map(parse_point).collect())
        .unwrap_or_default();
    let documents = value
        .get("documents")
        .and_then(Value::as_array)
        .map(|docs| docs.iter().filter_map(parse_document).collect())
        .unwrap_or_default();

    Some(ReviewRecord {
        id,
        slug,
        name,
        rating: parse_rating(value),
        urls: string_list(value, "urls"),
        image: str_field(value, "image").filter(|i| !i.is_empty()).map(str::to_string),
        points,
        documents,
    })
}

/// Read the `services` array of a search or listing payload.
pub fn parse_services(body: &Value) -> Result<(Vec<ReviewRecord>, usize), SourceError> {
    let entries = body
        .get("services")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::Malformed("missing `services` array".to_string()))?;

    let mut services = Vec::with_capacity(entries.len());
    let mut skipped = 0;
    for entry in entries {
        match parse_service(entry) {
            Some(service) => services.push(service),
            None => skipped += 1,
        }
    }
    Ok((services, skipped))
}

/// Read one listing page: `{services: [...], page: {current, end}}`.
pub fn parse_page(body: &Value) -> Result<ReviewPage, SourceError> {
    let (services, skipped) = parse_services(body)?;
    let page = body
        .get("page")
        .ok_or_else(|| SourceError::Malformed("missing `page` cursor".to_string()))?;
    let cursor = |key: &str| {
        page.get(key)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| SourceError::Malformed(format!("missing or out-of-range page.{key}")))
    };
    Ok(ReviewPage {
        services,
        current: cursor("current")?,
        end: cursor("end")?,
        skipped,
    })
}

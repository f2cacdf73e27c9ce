//! PrivacySpy product catalog: a JSON array of company objects.

use serde::Deserialize;

use super::{Fetcher, SourceError};
use crate::models::{PolicyRecord, RubricItem};

#[derive(Debug, Deserialize)]
struct RawProduct {
    name: String,
    slug: String,
    #[serde(default)]
    parent: Option<String>,
    score: f64,
    #[serde(default)]
    hostnames: Vec<String>,
    #[serde(default)]
    rubric: Vec<RawRubricEntry>,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default)]
    icon: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRubricEntry {
    question: RawQuestion,
    option: RawOption,
    #[serde(default)]
    citations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    text: String,
    category: String,
    points: u32,
}

#[derive(Debug, Deserialize)]
struct RawOption {
    text: String,
    percent: u32,
}

impl From<RawProduct> for PolicyRecord {
    fn from(raw: RawProduct) -> Self {
        PolicyRecord {
            name: raw.name,
            slug: raw.slug,
            parent_slug: raw.parent.filter(|p| !p.trim().is_empty()),
            score: raw.score,
            hostnames: raw.hostnames,
            rubric: raw.rubric.into_iter().map(RubricItem::from).collect(),
            sources: raw.sources,
            icon: raw.icon.filter(|i| !i.is_empty()),
        }
    }
}

impl From<RawRubricEntry> for RubricItem {
    fn from(raw: RawRubricEntry) -> Self {
        let percent = raw.option.percent.min(100);
        RubricItem {
            question_text: raw.question.text,
            category: capitalize(&raw.question.category),
            chosen_option_text: raw.option.text,
            percent,
            total_points: raw.question.points,
            citations: raw.citations,
            score: RubricItem::points_for(percent, raw.question.points),
        }
    }
}

/// First character upper-cased, the rest lower-cased.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Parse the catalog, skipping entries that do not have the expected shape.
///
/// Fails only when the payload is not a JSON array at all.
pub fn parse_catalog(text: &str) -> Result<(Vec<PolicyRecord>, usize), SourceError> {
    let entries: Vec<serde_json::Value> =
        serde_json::from_str(text).map_err(|e| SourceError::Malformed(e.to_string()))?;

    let mut records = Vec::with_capacity(entries.len());
    let mut skipped = 0;
    for entry in entries {
        match serde_json::from_value::<RawProduct>(entry) {
            Ok(raw) => records.push(PolicyRecord::from(raw)),
            Err(err) => {
                skipped += 1;
                tracing::debug!(error = %err, "skipping malformed policy record");
            }
        }
    }
    if skipped > 0 {
        tracing::warn!(skipped, kept = records.len(), "dropped malformed policy records");
    }
    Ok((records, skipped))
}

pub async fn fetch_catalog(fetcher: &Fetcher, url: &str) -> Result<(Vec<PolicyRecord>, usize), SourceError> {
    let text = fetcher.get_text(url).await?;
    parse_catalog(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"[
        {
            "name": "Acme",
            "slug": "acme",
            "parent": null,
            "score": 7.2,
            "hostnames": ["acme.com"],
            "sources": ["https://acme.com/privacy"],
            "icon": "acme.png",
            "rubric": [
                {
                    "question": {"slug": "q1", "text": "Does it sell data?", "category": "SHARING", "points": 5},
                    "option": {"id": "o1", "text": "No", "percent": 50},
                    "citations": ["We never sell data."]
                }
            ]
        },
        {"name": "Broken", "slug": "broken"},
        {"name": "Acme Maps", "slug": "acme-maps", "parent": "acme", "score": 3, "hostnames": []}
    ]"#;

    #[test]
    fn test_parse_catalog_skips_malformed() {
        let (records, skipped) = parse_catalog(CATALOG).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(skipped, 1);
        assert_eq!(records[1].parent_slug.as_deref(), Some("acme"));
    }

    #[test]
    fn test_rubric_item_conversion() {
        let (records, _) = parse_catalog(CATALOG).unwrap();
        let item = &records[0].rubric[0];
        assert_eq!(item.category, "Sharing");
        assert_eq!(item.chosen_option_text, "No");
        assert_eq!(item.total_points, 5);
        // 0.5 * 5 = 2.5 rounds to even
        assert_eq!(item.score, 2);
        assert_eq!(item.citations, vec!["We never sell data.".to_string()]);
    }

    #[test]
    fn test_non_array_payload_is_malformed() {
        assert!(matches!(
            parse_catalog(r#"{"products": []}"#),
            Err(SourceError::Malformed(_))
        ));
    }
}

//! Combines whatever the two catalogs yielded for a query into one bounded
//! score, plus the display name, image and policy links shown next to it.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use serde::Serialize;

use crate::config::Config;
use crate::models::{
    Classification, CompositeScore, PolicyLink, PolicyRecord, Provenance, ReviewPoint, ReviewRecord, RubricItem,
};
use crate::resolve::policy::{PolicyMatch, PolicyResolver};
use crate::resolve::review::resolve_review;
use crate::resolve::{normalize_query, Resolution};
use crate::snapshot::ReferenceData;
use crate::source::review::ReviewSource;
use crate::source::Fetcher;

/// Ordinal score of a review letter grade. Anything else scores 0.
pub fn grade_rating(rating: &str) -> u8 {
    match rating.trim() {
        "A" => 9,
        "B" => 7,
        "C" => 5,
        "D" => 3,
        "E" => 1,
        _ => 0,
    }
}

/// Merge a rubric score and a review ordinal.
///
/// Both absent → `None`; one present → that value; both → their mean.
/// The result is clamped to `[0, 10]`.
pub fn combine(rubric: Option<f64>, review: Option<f64>) -> Option<CompositeScore> {
    let value = match (rubric, review) {
        (None, None) => return None,
        (Some(r), None) | (None, Some(r)) => r,
        (Some(a), Some(b)) => (a + b) / 2.0,
    };
    Some(CompositeScore {
        value: value.clamp(0.0, 10.0),
        provenance: Provenance {
            rubric_used: rubric.is_some(),
            review_used: review.is_some(),
        },
    })
}

/// Review documents when there are any, else the rubric sources labeled by
/// position.
pub fn policy_links(policy: Option<&PolicyRecord>, review: Option<&ReviewRecord>) -> Vec<PolicyLink> {
    if let Some(review) = review.filter(|r| !r.documents.is_empty()) {
        return review
            .documents
            .iter()
            .map(|d| PolicyLink {
                label: d.name.clone(),
                url: d.url.clone(),
            })
            .collect();
    }
    policy
        .map(|p| {
            p.sources
                .iter()
                .enumerate()
                .map(|(i, url)| PolicyLink {
                    label: format!("Source {}", i + 1),
                    url: url.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Checks whether an image URL is reachable.
#[async_trait]
pub trait UrlProbe: Send + Sync {
    async fn is_ok(&self, url: &str) -> bool;
}

#[async_trait]
impl UrlProbe for Fetcher {
    async fn is_ok(&self, url: &str) -> bool {
        self.probe(url).await
    }
}

/// The review image if it answers 200, else the rubric catalog icon.
pub async fn display_image(
    probe: &dyn UrlProbe,
    review: Option<&ReviewRecord>,
    policy: Option<&PolicyRecord>,
    icon_base: &str,
) -> Option<String> {
    if let Some(image) = review.and_then(|r| r.image.as_deref()) {
        if probe.is_ok(image).await {
            return Some(image.to_string());
        }
        tracing::debug!(image, "review image unreachable; falling back to policy icon");
    }
    let icon = policy?.icon.as_deref()?;
    if icon.starts_with("http://") || icon.starts_with("https://") {
        Some(icon.to_string())
    } else {
        Some(format!("{icon_base}{icon}"))
    }
}

/// Two resolved records describe the same company when their hostname sets
/// intersect (case-insensitive).
pub fn hostnames_align(policy_hosts: &[String], review_urls: &[String]) -> bool {
    let policy: HashSet<String> = policy_hosts.iter().map(|h| h.to_lowercase()).collect();
    review_urls.iter().any(|u| policy.contains(&u.to_lowercase()))
}

/// Rubric items grouped by category, in first-seen order.
pub fn group_rubric(items: &[RubricItem]) -> Vec<(&str, Vec<&RubricItem>)> {
    let mut groups: Vec<(&str, Vec<&RubricItem>)> = Vec::new();
    for item in items {
        match groups.iter_mut().find(|(category, _)| *category == item.category) {
            Some((_, members)) => members.push(item),
            None => groups.push((item.category.as_str(), vec![item])),
        }
    }
    groups
}

/// Review points grouped by classification: Good, Neutral, Bad, Blocker.
pub fn group_points(points: &[ReviewPoint]) -> BTreeMap<Classification, Vec<&ReviewPoint>> {
    let mut groups: BTreeMap<Classification, Vec<&ReviewPoint>> = BTreeMap::new();
    for point in points {
        groups.entry(point.classification).or_default().push(point);
    }
    groups
}

/// Everything the presentation layer needs for one query.
#[derive(Debug, Clone, Serialize)]
pub struct LookupReport {
    pub query: String,
    pub policy: Resolution<PolicyMatch>,
    pub review: Resolution<ReviewRecord>,
    /// `false` when both catalogs resolved to records with no hostname in
    /// common; the caller should ask for a more specific query.
    pub aligned: bool,
    pub composite: Option<CompositeScore>,
    pub display_name: Option<String>,
    pub image: Option<String>,
    pub links: Vec<PolicyLink>,
}

/// Resolve `raw_query` against both catalogs and combine the evidence.
pub async fn lookup(
    raw_query: &str,
    reference: &ReferenceData,
    reviews: &dyn ReviewSource,
    probe: &dyn UrlProbe,
    config: &Config,
) -> LookupReport {
    let query = normalize_query(raw_query);
    let policy = PolicyResolver::new(reference.catalog(), &config.resolver).resolve(&query);
    let review = resolve_review(reviews, &query).await;
    tracing::debug!(
        query = %query,
        policy_resolved = policy.is_resolved(),
        review_resolved = review.is_resolved(),
        "lookup resolved"
    );

    let policy_match = policy.resolved();
    let review_record = review.resolved();

    let aligned = match (policy_match, review_record) {
        (Some(m), Some(r)) => {
            let hosts: Vec<String> = m
                .chain
                .iter()
                .filter_map(|slug| reference.catalog().by_slug(slug))
                .flat_map(|record| record.hostnames.iter().cloned())
                .collect();
            hostnames_align(&hosts, &r.urls)
        }
        _ => true,
    };

    if !aligned {
        tracing::info!(query = %query, "catalogs resolved to different companies");
        return LookupReport {
            query,
            policy,
            review,
            aligned,
            composite: None,
            display_name: None,
            image: None,
            links: Vec::new(),
        };
    }

    let policy_record = policy_match.map(|m| &m.record);
    let composite = combine(
        policy_record.map(|p| p.score),
        review_record.map(|r| f64::from(grade_rating(&r.rating.to_string()))),
    );
    let display_name = review_record
        .map(|r| r.name.clone())
        .or_else(|| policy_record.map(|p| p.name.clone()));
    let image = display_image(probe, review_record, policy_record, &config.sources.policy_icon_base).await;
    let links = policy_links(policy_record, review_record);

    LookupReport {
        query,
        policy,
        review,
        aligned,
        composite,
        display_name,
        image,
        links,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Document, Rating};
    use crate::source::review::ReviewPage;
    use crate::source::SourceError;

    fn policy_record(name: &str, slug: &str, score: f64, hostnames: &[&str]) -> PolicyRecord {
        PolicyRecord {
            name: name.to_string(),
            slug: slug.to_string(),
            parent_slug: None,
            score,
            hostnames: hostnames.iter().map(|h| h.to_string()).collect(),
            rubric: Vec::new(),
            sources: vec!["https://acme.com/privacy".to_string(), "https://acme.com/terms".to_string()],
            icon: Some("acme.png".to_string()),
        }
    }

    fn review_record(name: &str, rating: Rating, urls: &[&str]) -> ReviewRecord {
        ReviewRecord {
            id: 42,
            slug: name.to_lowercase(),
            name: name.to_string(),
            rating,
            urls: urls.iter().map(|u| u.to_string()).collect(),
            image: Some("https://img.example/42.png".to_string()),
            points: Vec::new(),
            documents: Vec::new(),
        }
    }

    struct StaticProbe(bool);

    #[async_trait]
    impl UrlProbe for StaticProbe {
        async fn is_ok(&self, _url: &str) -> bool {
            self.0
        }
    }

    struct OneService(Option<ReviewRecord>);

    #[async_trait]
    impl ReviewSource for OneService {
        async fn search(&self, _query: &str) -> Result<Vec<ReviewRecord>, SourceError> {
            Ok(self.0.iter().cloned().collect())
        }

        async fn service(&self, _id: u64) -> Result<ReviewRecord, SourceError> {
            self.0.clone().ok_or(SourceError::Status(404))
        }

        async fn page(&self, _page: u32) -> Result<ReviewPage, SourceError> {
            Err(SourceError::Status(404))
        }
    }

    #[test]
    fn test_grade_rating() {
        for (rating, expected) in [("A", 9), ("B", 7), ("C", 5), ("D", 3), ("E", 1), ("N/A", 0)] {
            assert_eq!(grade_rating(rating), expected);
        }
        assert_eq!(grade_rating("Z"), 0);
        assert_eq!(grade_rating("Unknown"), 0);
        assert_eq!(grade_rating(""), 0);
    }

    #[test]
    fn test_combine_rules() {
        assert_eq!(combine(None, None), None);

        let only_rubric = combine(Some(6.0), None).unwrap();
        assert_eq!(only_rubric.value, 6.0);
        assert!(only_rubric.provenance.rubric_used);
        assert!(!only_rubric.provenance.review_used);

        let only_review = combine(None, Some(7.0)).unwrap();
        assert_eq!(only_review.value, 7.0);
        assert!(only_review.provenance.review_used);

        let both = combine(Some(8.0), Some(7.0)).unwrap();
        assert_eq!(both.value, 7.5);
        assert!(both.provenance.rubric_used && both.provenance.review_used);
    }

    #[test]
    fn test_combine_clamps() {
        assert_eq!(combine(Some(14.0), None).unwrap().value, 10.0);
        assert_eq!(combine(Some(-2.0), Some(0.0)).unwrap().value, 0.0);
    }

    #[test]
    fn test_policy_links_prefer_review_documents() {
        let policy = policy_record("Acme", "acme", 7.0, &[]);
        let mut review = review_record("Acme", Rating::B, &[]);

        let links = policy_links(Some(&policy), Some(&review));
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].label, "Source 1");
        assert_eq!(links[1].label, "Source 2");

        review.documents.push(Document {
            name: "Terms of Service".into(),
            url: "https://acme.com/tos".into(),
        });
        let links = policy_links(Some(&policy), Some(&review));
        assert_eq!(links, vec![PolicyLink {
            label: "Terms of Service".into(),
            url: "https://acme.com/tos".into(),
        }]);

        assert!(policy_links(None, None).is_empty());
    }

    #[tokio::test]
    async fn test_display_image_fallback() {
        let policy = policy_record("Acme", "acme", 7.0, &[]);
        let review = review_record("Acme", Rating::B, &[]);
        let base = "https://icons.example/";

        let image = display_image(&StaticProbe(true), Some(&review), Some(&policy), base).await;
        assert_eq!(image.as_deref(), Some("https://img.example/42.png"));

        let image = display_image(&StaticProbe(false), Some(&review), Some(&policy), base).await;
        assert_eq!(image.as_deref(), Some("https://icons.example/acme.png"));

        assert_eq!(display_image(&StaticProbe(false), Some(&review), None, base).await, None);
    }

    #[test]
    fn test_hostnames_align() {
        let policy = vec!["Acme.com".to_string(), "acme.org".to_string()];
        assert!(hostnames_align(&policy, &["acme.com".to_string()]));
        assert!(!hostnames_align(&policy, &["globex.com".to_string()]));
        assert!(!hostnames_align(&[], &[]));
    }

    #[test]
    fn test_group_points_order() {
        let point = |c, t: &str| ReviewPoint {
            classification: c,
            title: t.to_string(),
            description: String::new(),
        };
        let points = vec![
            point(Classification::Bad, "b1"),
            point(Classification::Good, "g1"),
            point(Classification::Blocker, "x1"),
            point(Classification::Bad, "b2"),
        ];
        let groups = group_points(&points);
        let order: Vec<_> = groups.keys().copied().collect();
        assert_eq!(order, vec![Classification::Good, Classification::Bad, Classification::Blocker]);
        assert_eq!(groups[&Classification::Bad].len(), 2);
    }

    #[test]
    fn test_group_rubric_first_seen_order() {
        let item = |category: &str| RubricItem {
            question_text: "q".into(),
            category: category.into(),
            chosen_option_text: "o".into(),
            percent: 100,
            total_points: 1,
            citations: Vec::new(),
            score: 1,
        };
        let items = vec![item("Sharing"), item("Handling"), item("Sharing")];
        let groups = group_rubric(&items);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "Sharing");
        assert_eq!(groups[0].1.len(), 2);
    }

    #[tokio::test]
    async fn test_lookup_both_sources() {
        let reference = ReferenceData::from_records(vec![policy_record("Acme", "acme", 8.0, &["acme.com"])], 0);
        let reviews = OneService(Some(review_record("Acme", Rating::B, &["acme.com"])));
        let report = lookup("https://www.acme.com/", &reference, &reviews, &StaticProbe(true), &Config::default()).await;

        assert_eq!(report.query, "acme.com");
        assert!(report.aligned);
        assert_eq!(report.composite.unwrap().value, 7.5);
        assert_eq!(report.display_name.as_deref(), Some("Acme"));
        assert_eq!(report.image.as_deref(), Some("https://img.example/42.png"));
        assert_eq!(report.links.len(), 2);
    }

    #[tokio::test]
    async fn test_lookup_policy_only() {
        let reference = ReferenceData::from_records(vec![policy_record("Acme", "acme", 7.0, &["acme.com"])], 0);
        let report = lookup("acme.com", &reference, &OneService(None), &StaticProbe(true), &Config::default()).await;

        assert_eq!(report.review, Resolution::NotFound);
        let composite = report.composite.unwrap();
        assert_eq!(composite.value, 7.0);
        assert!(!composite.provenance.review_used);
        assert_eq!(report.display_name.as_deref(), Some("Acme"));
        assert!(report.image.unwrap().ends_with("acme.png"));
    }

    #[tokio::test]
    async fn test_lookup_neither_source() {
        let reference = ReferenceData::from_records(Vec::new(), 0);
        let report = lookup("nobody.example", &reference, &OneService(None), &StaticProbe(true), &Config::default()).await;
        assert_eq!(report.policy, Resolution::NotFound);
        assert_eq!(report.review, Resolution::NotFound);
        assert_eq!(report.composite, None);
        assert_eq!(report.display_name, None);
    }

    #[tokio::test]
    async fn test_lookup_misaligned_catalogs() {
        let reference = ReferenceData::from_records(vec![policy_record("Acme", "acme", 7.0, &["acme.com"])], 0);
        // Review service matches by name but lists a different domain.
        let reviews = OneService(Some(review_record("Acme", Rating::A, &["acme-games.net"])));
        let report = lookup("Acme", &reference, &reviews, &StaticProbe(true), &Config::default()).await;

        assert!(!report.aligned);
        assert_eq!(report.composite, None);
        assert_eq!(report.display_name, None);
        assert!(report.policy.is_resolved());
        assert!(report.review.is_resolved());
    }
}

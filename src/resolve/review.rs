use std::collections::BTreeSet;

use super::{first_token, Resolution};
use crate::config::EnumerationConfig;
use crate::models::{PolicyRecord, ReviewRecord};
use crate::source::review::ReviewSource;
use crate::source::{CancelSignal, SourceError};

/// `true` when `candidate` identifies `query`: same name (case-insensitive),
/// a url containing the query, or the same slug.
fn matches_query(candidate: &ReviewRecord, query: &str) -> bool {
    let lowered = query.to_lowercase();
    candidate.name.eq_ignore_ascii_case(query)
        || candidate.urls.iter().any(|u| u.to_lowercase().contains(&lowered))
        || candidate.slug == query
}

/// Resolve `query` through the service's own search, then fetch the chosen
/// service's full record. Unrated candidates are never chosen.
pub async fn resolve_review(source: &dyn ReviewSource, query: &str) -> Resolution<ReviewRecord> {
    let query = query.trim();
    if query.is_empty() {
        return Resolution::NotFound;
    }

    let candidates = match source.search(query).await {
        Ok(candidates) => candidates,
        Err(err) => {
            tracing::warn!(query, error = %err, "review search failed");
            return err.into();
        }
    };
    if candidates.is_empty() {
        tracing::debug!(query, "review search returned no candidates");
        return Resolution::NotFound;
    }

    let Some(chosen) = candidates
        .into_iter()
        .filter(|c| c.rating.is_rated())
        .find(|c| matches_query(c, query))
    else {
        tracing::debug!(query, "no rated review candidate matched");
        return Resolution::NotFound;
    };

    match source.service(chosen.id).await {
        Ok(detail) => Resolution::Resolved(merge_detail(chosen, detail)),
        Err(SourceError::Cancelled) => Resolution::Cancelled,
        Err(err) => {
            tracing::warn!(id = chosen.id, error = %err, "service detail unavailable; using search result");
            Resolution::Resolved(chosen)
        }
    }
}

/// Prefer the detail payload, falling back to search-result fields it lacks.
fn merge_detail(candidate: ReviewRecord, detail: ReviewRecord) -> ReviewRecord {
    ReviewRecord {
        id: candidate.id,
        slug: candidate.slug,
        name: detail.name,
        rating: if detail.rating.is_rated() { detail.rating } else { candidate.rating },
        urls: if detail.urls.is_empty() { candidate.urls } else { detail.urls },
        image: detail.image.or(candidate.image),
        points: detail.points,
        documents: if detail.documents.is_empty() { candidate.documents } else { detail.documents },
    }
}

fn denylisted(name: &str, denylist: &[String]) -> bool {
    let lowered = name.to_lowercase();
    denylist.iter().any(|d| lowered.contains(&d.to_lowercase()))
}

/// Names of every rated, non-denylisted service in the review catalog.
///
/// Pages are fetched strictly one after another with `page_delay` between
/// them. A 429 is retried after `backoff` up to `max_retries` times; any other
/// failure ends the enumeration with that error. `on_page(current, end)` is
/// called after every successful page. Tripping `cancel` interrupts the
/// waits between requests.
pub async fn enumerate_reviewed(
    source: &dyn ReviewSource,
    config: &EnumerationConfig,
    cancel: &CancelSignal,
    mut on_page: impl FnMut(u32, u32),
) -> Result<Vec<String>, SourceError> {
    let mut names = Vec::new();
    let mut page_no = 1u32;

    loop {
        let page = fetch_page_with_backoff(source, page_no, config, cancel).await?;
        on_page(page.current, page.end);
        if page.skipped > 0 {
            tracing::debug!(page = page.current, skipped = page.skipped, "unreadable services on page");
        }

        names.extend(
            page.services
                .into_iter()
                .filter(|s| s.rating.is_rated())
                .filter(|s| !denylisted(&s.name, &config.denylist))
                .map(|s| s.name),
        );

        if page.current == page.end {
            break;
        }
        if page.current > page.end || page_no >= config.max_pages {
            tracing::warn!(
                current = page.current,
                end = page.end,
                fetched = page_no,
                "page cursor never reached its end; stopping"
            );
            break;
        }

        page_no += 1;
        cancel.sleep(config.page_delay()).await?;
    }

    tracing::info!(services = names.len(), pages = page_no, "review catalog enumerated");
    Ok(names)
}

async fn fetch_page_with_backoff(
    source: &dyn ReviewSource,
    page_no: u32,
    config: &EnumerationConfig,
    cancel: &CancelSignal,
) -> Result<crate::source::review::ReviewPage, SourceError> {
    let mut attempts = 0;
    loop {
        match source.page(page_no).await {
            Err(SourceError::RateLimited) if attempts < config.max_retries => {
                attempts += 1;
                tracing::warn!(page = page_no, attempt = attempts, "rate limited; backing off");
                cancel.sleep(config.backoff()).await?;
            }
            other => return other,
        }
    }
}

/// Merge the reviewed names with every policy-catalog company not already
/// represented (no listed name contains the company's first token), then
/// deduplicate and sort.
pub fn master_site_list(reviewed: Vec<String>, policies: &[PolicyRecord]) -> Vec<String> {
    let mut lowered: Vec<String> = reviewed.iter().map(|n| n.to_lowercase()).collect();
    let mut list = reviewed;

    for policy in policies {
        let token = first_token(&policy.name);
        if token.is_empty() {
            continue;
        }
        if !lowered.iter().any(|name| name.contains(&token)) {
            lowered.push(policy.name.to_lowercase());
            list.push(policy.name.clone());
        }
    }

    list.into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Document, Rating};
    use crate::source::review::ReviewPage;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn service(id: u64, name: &str, rating: Rating, urls: &[&str]) -> ReviewRecord {
        ReviewRecord {
            id,
            slug: name.to_lowercase().replace(' ', "-"),
            name: name.to_string(),
            rating,
            urls: urls.iter().map(|u| u.to_string()).collect(),
            image: None,
            points: Vec::new(),
            documents: Vec::new(),
        }
    }

    /// In-memory catalog. Page responses are scripted in order.
    #[derive(Default)]
    struct FakeSource {
        search_results: Vec<ReviewRecord>,
        search_error: Mutex<Option<SourceError>>,
        details: Vec<ReviewRecord>,
        pages: Mutex<VecDeque<Result<ReviewPage, SourceError>>>,
        page_calls: AtomicUsize,
    }

    #[async_trait]
    impl ReviewSource for FakeSource {
        async fn search(&self, _query: &str) -> Result<Vec<ReviewRecord>, SourceError> {
            if let Some(err) = self.search_error.lock().unwrap().take() {
                return Err(err);
            }
            Ok(self.search_results.clone())
        }

        async fn service(&self, id: u64) -> Result<ReviewRecord, SourceError> {
            self.details
                .iter()
                .find(|d| d.id == id)
                .cloned()
                .ok_or(SourceError::Status(404))
        }

        async fn page(&self, _page: u32) -> Result<ReviewPage, SourceError> {
            self.page_calls.fetch_add(1, Ordering::SeqCst);
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(SourceError::Transport("no more pages".into())))
        }
    }

    fn page(services: Vec<ReviewRecord>, current: u32, end: u32) -> Result<ReviewPage, SourceError> {
        Ok(ReviewPage {
            services,
            current,
            end,
            skipped: 0,
        })
    }

    fn fast_config() -> EnumerationConfig {
        EnumerationConfig {
            page_delay_ms: 0,
            backoff_ms: 0,
            ..EnumerationConfig::default()
        }
    }

    #[tokio::test]
    async fn test_resolve_review_by_url_skips_unrated() {
        let source = FakeSource {
            search_results: vec![
                service(1, "Example Mirror", Rating::NotAvailable, &["example.com"]),
                service(2, "Example", Rating::B, &["example.com"]),
            ],
            details: vec![ReviewRecord {
                documents: vec![Document {
                    name: "Privacy".into(),
                    url: "https://example.com/privacy".into(),
                }],
                image: Some("https://img/2.png".into()),
                ..service(2, "Example", Rating::B, &["example.com"])
            }],
            ..FakeSource::default()
        };

        let resolved = resolve_review(&source, "example.com").await;
        let record = resolved.resolved().unwrap();
        assert_eq!(record.id, 2);
        assert_eq!(record.documents.len(), 1);
        assert_eq!(record.image.as_deref(), Some("https://img/2.png"));
    }

    #[tokio::test]
    async fn test_resolve_review_falls_back_to_candidate() {
        let source = FakeSource {
            search_results: vec![service(7, "Acme", Rating::C, &["acme.com"])],
            ..FakeSource::default()
        };
        let resolved = resolve_review(&source, "ACME").await;
        assert_eq!(resolved.resolved().unwrap().rating, Rating::C);
    }

    #[tokio::test]
    async fn test_resolve_review_no_candidates_is_not_found() {
        let source = FakeSource::default();
        assert_eq!(resolve_review(&source, "nothing").await, Resolution::NotFound);
    }

    #[tokio::test]
    async fn test_resolve_review_unmatched_candidates_is_not_found() {
        let source = FakeSource {
            search_results: vec![service(3, "Other", Rating::A, &["other.com"])],
            ..FakeSource::default()
        };
        assert_eq!(resolve_review(&source, "acme").await, Resolution::NotFound);
    }

    #[tokio::test]
    async fn test_resolve_review_rate_limited_is_distinct() {
        let source = FakeSource {
            search_error: Mutex::new(Some(SourceError::RateLimited)),
            ..FakeSource::default()
        };
        assert_eq!(resolve_review(&source, "acme").await, Resolution::RateLimited);
    }

    #[tokio::test]
    async fn test_resolve_review_transport_failure() {
        let source = FakeSource {
            search_error: Mutex::new(Some(SourceError::Transport("dns".into()))),
            ..FakeSource::default()
        };
        assert!(matches!(
            resolve_review(&source, "acme").await,
            Resolution::TransportFailure(_)
        ));
    }

    #[tokio::test]
    async fn test_enumeration_two_pages_two_fetches() {
        let source = FakeSource {
            pages: Mutex::new(VecDeque::from(vec![
                page(
                    vec![
                        service(1, "Alpha", Rating::A, &[]),
                        service(2, "Unrated", Rating::NotAvailable, &[]),
                        service(3, "PornHub", Rating::E, &[]),
                    ],
                    1,
                    2,
                ),
                page(vec![service(4, "Beta", Rating::D, &[])], 2, 2),
            ])),
            ..FakeSource::default()
        };

        let mut seen = Vec::new();
        let names = enumerate_reviewed(&source, &fast_config(), &CancelSignal::new(), |c, e| seen.push((c, e)))
            .await
            .unwrap();
        assert_eq!(source.page_calls.load(Ordering::SeqCst), 2);
        assert_eq!(names, vec!["Alpha".to_string(), "Beta".to_string()]);
        assert_eq!(seen, vec![(1, 2), (2, 2)]);
    }

    #[tokio::test]
    async fn test_enumeration_retries_rate_limited_page() {
        let source = FakeSource {
            pages: Mutex::new(VecDeque::from(vec![
                Err(SourceError::RateLimited),
                page(vec![service(1, "Alpha", Rating::A, &[])], 1, 1),
            ])),
            ..FakeSource::default()
        };
        let names = enumerate_reviewed(&source, &fast_config(), &CancelSignal::new(), |_, _| {}).await.unwrap();
        assert_eq!(names, vec!["Alpha".to_string()]);
        assert_eq!(source.page_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_enumeration_gives_up_after_retries() {
        let config = EnumerationConfig {
            max_retries: 1,
            ..fast_config()
        };
        let source = FakeSource {
            pages: Mutex::new(VecDeque::from(vec![
                Err(SourceError::RateLimited),
                Err(SourceError::RateLimited),
            ])),
            ..FakeSource::default()
        };
        let err = enumerate_reviewed(&source, &config, &CancelSignal::new(), |_, _| {}).await.unwrap_err();
        assert!(matches!(err, SourceError::RateLimited));
        assert_eq!(source.page_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_enumeration_stops_at_max_pages() {
        let config = EnumerationConfig {
            max_pages: 2,
            ..fast_config()
        };
        let source = FakeSource {
            pages: Mutex::new(VecDeque::from(vec![page(vec![], 1, 9), page(vec![], 2, 9), page(vec![], 3, 9)])),
            ..FakeSource::default()
        };
        enumerate_reviewed(&source, &config, &CancelSignal::new(), |_, _| {}).await.unwrap();
        assert_eq!(source.page_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff() {
        let config = EnumerationConfig {
            backoff_ms: 60_000,
            ..fast_config()
        };
        let source = FakeSource {
            pages: Mutex::new(VecDeque::from(vec![
                Err(SourceError::RateLimited),
                page(vec![service(1, "Alpha", Rating::A, &[])], 1, 1),
            ])),
            ..FakeSource::default()
        };
        let cancel = CancelSignal::new();
        cancel.cancel();

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            enumerate_reviewed(&source, &config, &cancel, |_, _| {}),
        )
        .await
        .expect("back-off should not outlive cancellation");
        assert!(matches!(result, Err(SourceError::Cancelled)));
        assert_eq!(source.page_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_page_delay() {
        let config = EnumerationConfig {
            page_delay_ms: 60_000,
            ..fast_config()
        };
        let source = FakeSource {
            pages: Mutex::new(VecDeque::from(vec![page(vec![], 1, 2), page(vec![], 2, 2)])),
            ..FakeSource::default()
        };
        let cancel = CancelSignal::new();
        let trip = cancel.clone();

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            enumerate_reviewed(&source, &config, &cancel, move |_, _| trip.cancel()),
        )
        .await
        .expect("page delay should not outlive cancellation");
        assert!(matches!(result, Err(SourceError::Cancelled)));
        assert_eq!(source.page_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_master_site_list_adds_unrepresented_policies() {
        let policy = |name: &str| PolicyRecord {
            name: name.to_string(),
            slug: name.to_lowercase(),
            parent_slug: None,
            score: 5.0,
            hostnames: Vec::new(),
            rubric: Vec::new(),
            sources: Vec::new(),
            icon: None,
        };
        let reviewed = vec!["Google Search".to_string(), "Beta".to_string(), "Beta".to_string()];
        let policies = vec![policy("Google"), policy("Zeta Corp"), policy("Alpha")];

        let list = master_site_list(reviewed, &policies);
        assert_eq!(
            list,
            vec!["Alpha".to_string(), "Beta".to_string(), "Google Search".to_string(), "Zeta Corp".to_string()]
        );
    }
}

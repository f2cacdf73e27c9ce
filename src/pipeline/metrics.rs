use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::ScoreWeights;
use crate::models::{CategoryShare, SiteMetrics, TrackerFact};
use crate::pipeline::score::{privacy_score, ScoreFeatures};
use crate::source::telemetry::SiteRow;

/// Category whose trackers are counted as advertising trackers.
pub const ADVERTISING: &str = "Advertising";

/// Min-max scale `values` into `[0, 1]` over the whole population.
///
/// A constant population (max == min) scales to all zeros. Non-finite
/// inputs are treated as 0 before scaling.
pub fn min_max_scale(values: &[f64]) -> Vec<f64> {
    let finite = |v: f64| if v.is_finite() { v } else { 0.0 };
    let (min, max) = values
        .iter()
        .map(|v| finite(*v))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));

    let range = max - min;
    values
        .iter()
        .map(|v| {
            if range > 0.0 {
                ((finite(*v) - min) / range).clamp(0.0, 1.0)
            } else {
                0.0
            }
        })
        .collect()
}

/// `requests_tracking / requests × 100`, `None` when there were no requests.
pub fn percentage_tracking(requests: f64, requests_tracking: f64) -> Option<f64> {
    (requests > 0.0).then(|| requests_tracking / requests * 100.0)
}

/// Distinct trackers per site, and distinct advertising trackers per site.
fn distinct_counts(facts: &[TrackerFact]) -> (HashMap<&str, u32>, HashMap<&str, u32>) {
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut totals: HashMap<&str, u32> = HashMap::new();
    let mut ads: HashMap<&str, u32> = HashMap::new();

    for fact in facts {
        if !seen.insert((fact.site.as_str(), fact.tracker_id.as_str())) {
            continue;
        }
        *totals.entry(fact.site.as_str()).or_insert(0) += 1;
        if fact.category.as_deref() == Some(ADVERTISING) {
            *ads.entry(fact.site.as_str()).or_insert(0) += 1;
        }
    }
    (totals, ads)
}

/// Build one [`SiteMetrics`] per site row: attach tracker counts (0 for sites
/// with no observations), scale the features over the population, and score.
pub fn aggregate_sites(sites: &[SiteRow], facts: &[TrackerFact], weights: &ScoreWeights) -> Vec<SiteMetrics> {
    let (totals, ads) = distinct_counts(facts);

    let total_trackers: Vec<u32> = sites
        .iter()
        .map(|s| totals.get(s.site.as_str()).copied().unwrap_or(0))
        .collect();
    let total_ad_trackers: Vec<u32> = sites
        .iter()
        .map(|s| ads.get(s.site.as_str()).copied().unwrap_or(0))
        .collect();

    let column = |f: fn(&SiteRow) -> f64| -> Vec<f64> { sites.iter().map(f).collect() };
    let scaled_total = min_max_scale(&total_trackers.iter().map(|n| f64::from(*n)).collect::<Vec<_>>());
    let scaled_ad_total = min_max_scale(&total_ad_trackers.iter().map(|n| f64::from(*n)).collect::<Vec<_>>());
    let scaled_companies = min_max_scale(&column(|s: &SiteRow| s.companies));
    let scaled_requests_tracking = min_max_scale(&column(|s: &SiteRow| s.requests_tracking));
    let scaled_trackers = min_max_scale(&column(|s: &SiteRow| s.trackers));

    sites
        .iter()
        .enumerate()
        .map(|(i, site)| {
            let tracked = site.tracked.clamp(0.0, 1.0);
            let referer_leaked = site.referer_leaked.clamp(0.0, 1.0);
            let features = ScoreFeatures {
                scaled_total: scaled_total[i],
                scaled_ad_total: scaled_ad_total[i],
                scaled_companies: scaled_companies[i],
                tracked,
                scaled_requests_tracking: scaled_requests_tracking[i],
                scaled_trackers: scaled_trackers[i],
                referer_leaked,
            };
            SiteMetrics {
                site: site.site.clone(),
                popularity: site.popularity,
                total_trackers: total_trackers[i],
                total_ad_trackers: total_ad_trackers[i],
                companies: site.companies,
                tracked,
                referer_leaked,
                requests: site.requests,
                requests_tracking: site.requests_tracking,
                trackers: site.trackers,
                percentage_tracking_requests: percentage_tracking(site.requests, site.requests_tracking),
                scaled_total: features.scaled_total,
                scaled_ad_total: features.scaled_ad_total,
                scaled_companies: features.scaled_companies,
                scaled_requests_tracking: features.scaled_requests_tracking,
                scaled_trackers: features.scaled_trackers,
                privacy_score: privacy_score(&features, weights),
            }
        })
        .collect()
}

/// Read-only view over one pipeline run, answering per-site drill-down queries.
#[derive(Debug, Clone)]
pub struct SiteIndex {
    facts: Vec<TrackerFact>,
    metrics: Vec<SiteMetrics>,
    by_site: HashMap<String, usize>,
}

impl SiteIndex {
    pub fn new(facts: Vec<TrackerFact>, metrics: Vec<SiteMetrics>) -> Self {
        let mut by_site = HashMap::with_capacity(metrics.len());
        for (i, m) in metrics.iter().enumerate() {
            by_site.entry(m.site.clone()).or_insert(i);
        }
        SiteIndex {
            facts,
            metrics,
            by_site,
        }
    }

    pub fn metrics(&self, site: &str) -> Option<&SiteMetrics> {
        self.by_site.get(site).map(|i| &self.metrics[*i])
    }

    /// Tracker observations for one site; empty when the site is unknown.
    pub fn trackers_for(&self, site: &str) -> Vec<&TrackerFact> {
        self.facts.iter().filter(|f| f.site == site).collect()
    }

    /// Distinct trackers per category on `site`, with each category's share
    /// rounded to two decimals. Uncategorized trackers are left out.
    pub fn category_breakdown(&self, site: &str) -> Vec<CategoryShare> {
        let mut per_category: BTreeMap<&str, HashSet<&str>> = BTreeMap::new();
        for fact in self.facts.iter().filter(|f| f.site == site) {
            if let Some(category) = fact.category.as_deref() {
                per_category
                    .entry(category)
                    .or_default()
                    .insert(fact.tracker_id.as_str());
            }
        }

        let total: usize = per_category.values().map(HashSet::len).sum();
        per_category
            .into_iter()
            .map(|(category, trackers)| {
                let num = trackers.len();
                let percent = num as f64 / total as f64 * 100.0;
                CategoryShare {
                    category: category.to_string(),
                    num_trackers: num as u32,
                    percent: (percent * 100.0).round() / 100.0,
                }
            })
            .collect()
    }

    /// Every site, most popular first, ties broken by name.
    pub fn domains(&self) -> Vec<&str> {
        let mut sites: Vec<&SiteMetrics> = self.metrics.iter().collect();
        sites.sort_by(|a, b| {
            b.popularity
                .total_cmp(&a.popularity)
                .then_with(|| a.site.cmp(&b.site))
        });
        let mut seen = HashSet::new();
        sites
            .into_iter()
            .map(|m| m.site.as_str())
            .filter(|s| seen.insert(*s))
            .collect()
    }
}

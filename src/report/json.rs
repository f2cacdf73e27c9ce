use anyhow::Result;
use serde::Serialize;

use crate::composite::LookupReport;
use crate::models::{CategoryShare, RunStats, SiteMetrics, TrackerFact};

#[derive(Serialize)]
struct SiteReport<'a> {
    metrics: &'a SiteMetrics,
    display_score: u8,
    categories: &'a [CategoryShare],
    trackers: &'a [&'a TrackerFact],
    skipped: &'a RunStats,
}

pub fn lookups(reports: &[LookupReport]) -> Result<String> {
    Ok(match reports {
        [single] => serde_json::to_string_pretty(single)?,
        many => serde_json::to_string_pretty(many)?,
    })
}

pub fn site(
    metrics: &SiteMetrics,
    categories: &[CategoryShare],
    trackers: &[&TrackerFact],
    stats: &RunStats,
) -> Result<String> {
    Ok(serde_json::to_string_pretty(&SiteReport {
        metrics,
        display_score: metrics.display_score(),
        categories,
        trackers,
        skipped: stats,
    })?)
}

pub fn names<S: Serialize>(names: &[S]) -> Result<String> {
    Ok(serde_json::to_string_pretty(names)?)
}

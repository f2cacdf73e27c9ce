//! Telemetry path: taxonomy merge → per-site aggregation → privacy score.
//!
//! - [`merge`] — joins observations with the tracker taxonomy and reach table.
//! - [`metrics`] — distinct counts, min-max scaling and drill-down queries.
//! - [`score`] — the weighted privacy-score model.
//!
//! Every run recomputes everything from the full snapshot it is given.

pub mod merge;
pub mod metrics;
pub mod score;

use crate::config::Config;
use crate::models::RunStats;
use crate::source::taxonomy::{fetch_taxonomy, TaxonomyRow};
use crate::source::telemetry::{fetch_telemetry, Telemetry};
use crate::source::{Fetcher, SourceError};

use metrics::SiteIndex;

/// Result of one telemetry pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub index: SiteIndex,
    pub stats: RunStats,
}

/// Pure part of the run: merge, aggregate and score already-parsed tables.
pub fn build(telemetry: Telemetry, taxonomy: &[TaxonomyRow], taxonomy_skipped: usize, config: &Config) -> PipelineRun {
    let facts = merge::merge_trackers(&telemetry.site_trackers.rows, taxonomy, &telemetry.trackers.rows);
    let site_metrics = metrics::aggregate_sites(&telemetry.sites.rows, &facts, &config.weights);

    let stats = RunStats {
        skipped_site_tracker_rows: telemetry.site_trackers.skipped,
        skipped_tracker_rows: telemetry.trackers.skipped,
        skipped_site_rows: telemetry.sites.skipped,
        skipped_taxonomy_rows: taxonomy_skipped,
    };
    tracing::info!(
        facts = facts.len(),
        sites = site_metrics.len(),
        skipped = stats.total_skipped(),
        "telemetry pipeline complete"
    );

    PipelineRun {
        index: SiteIndex::new(facts, site_metrics),
        stats,
    }
}

/// Fetch every telemetry source and run the pipeline.
pub async fn run(fetcher: &Fetcher, config: &Config) -> Result<PipelineRun, SourceError> {
    let (taxonomy, taxonomy_skipped) = fetch_taxonomy(fetcher, &config.sources.trackerdb_url).await?;
    let telemetry = fetch_telemetry(fetcher, &config.sources).await?;
    Ok(build(telemetry, &taxonomy, taxonomy_skipped, config))
}

//! WhoTracks.me telemetry tables.
//!
//! Each CSV carries many more columns than the pipeline needs; unknown
//! columns are ignored and rows that fail to deserialize are skipped and
//! counted instead of aborting the whole table.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};

use super::{Fetcher, SourceError};
use crate::config::SourcesConfig;

/// One row of `sites_trackers.csv`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SiteTrackerRow {
    pub site: String,
    pub tracker: String,
}

/// One row of `trackers.csv` (only the reach columns).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackerReachRow {
    pub tracker: String,
    #[serde(default, deserialize_with = "finite_opt")]
    pub reach: Option<f64>,
    #[serde(default, deserialize_with = "finite_opt")]
    pub site_reach_top10k: Option<f64>,
}

/// One row of `sites.csv`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SiteRow {
    pub site: String,
    #[serde(default, deserialize_with = "finite")]
    pub popularity: f64,
    #[serde(deserialize_with = "finite")]
    pub companies: f64,
    #[serde(deserialize_with = "finite")]
    pub trackers: f64,
    #[serde(deserialize_with = "finite")]
    pub tracked: f64,
    #[serde(deserialize_with = "finite")]
    pub referer_leaked: f64,
    #[serde(deserialize_with = "finite")]
    pub requests: f64,
    #[serde(deserialize_with = "finite")]
    pub requests_tracking: f64,
}

// `f64::from_str` accepts `NaN` and `inf`; such a row carries no measurement.
fn finite<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(D::Error::custom(format!("non-finite number `{value}`")))
    }
}

fn finite_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    match Option::<f64>::deserialize(deserializer)? {
        Some(value) if !value.is_finite() => Err(D::Error::custom(format!("non-finite number `{value}`"))),
        other => Ok(other),
    }
}

/// A parsed table plus the number of rows that had to be dropped.
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub rows: Vec<T>,
    pub skipped: usize,
}

/// All three telemetry tables of one snapshot.
#[derive(Debug, Clone)]
pub struct Telemetry {
    pub site_trackers: Parsed<SiteTrackerRow>,
    pub trackers: Parsed<TrackerReachRow>,
    pub sites: Parsed<SiteRow>,
}

/// Parse a CSV document with a header row into `T`, skipping bad rows.
pub fn parse_csv<T: DeserializeOwned>(name: &str, text: &str) -> Result<Parsed<T>, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    // A missing header row means the payload is not the table we asked for.
    reader
        .headers()
        .map_err(|e| SourceError::Malformed(format!("{name}: {e}")))?;

    let mut rows = Vec::new();
    let mut skipped = 0;
    for (index, record) in reader.deserialize::<T>().enumerate() {
        match record {
            Ok(row) => rows.push(row),
            Err(err) => {
                skipped += 1;
                tracing::debug!(table = name, row = index + 1, error = %err, "skipping malformed row");
            }
        }
    }

    if skipped > 0 {
        tracing::warn!(table = name, skipped, kept = rows.len(), "dropped malformed rows");
    }
    Ok(Parsed { rows, skipped })
}

/// Download and parse the three telemetry tables, one after another.
pub async fn fetch_telemetry(fetcher: &Fetcher, config: &SourcesConfig) -> Result<Telemetry, SourceError> {
    let site_trackers = fetcher.get_text(&config.sites_trackers_csv_url).await?;
    let site_trackers = parse_csv("sites_trackers", &site_trackers)?;

    let trackers = fetcher.get_text(&config.trackers_csv_url).await?;
    let trackers = parse_csv("trackers", &trackers)?;

    let sites = fetcher.get_text(&config.sites_csv_url).await?;
    let sites = parse_csv("sites", &sites)?;

    tracing::info!(
        site_trackers = site_trackers.rows.len(),
        trackers = trackers.rows.len(),
        sites = sites.rows.len(),
        "telemetry loaded"
    );

    Ok(Telemetry {
        site_trackers,
        trackers,
        sites,
    })
}

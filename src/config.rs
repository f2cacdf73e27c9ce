use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::Deserialize;

/// Minimum full-string similarity (0–100) for a fuzzy rubric-catalog match.
pub const DEFAULT_RATIO_THRESHOLD: u8 = 51;
/// Minimum partial-string similarity (0–100) for a fuzzy rubric-catalog match.
pub const DEFAULT_PARTIAL_RATIO_THRESHOLD: u8 = 87;
/// Longest parent chain followed before the catalog is considered malformed.
pub const DEFAULT_MAX_PARENT_DEPTH: usize = 16;

/// Root configuration structure, deserialized from `.privacy-scope/config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sources: SourcesConfig,
    pub resolver: ResolverConfig,
    pub enumeration: EnumerationConfig,
    pub weights: ScoreWeights,
    pub snapshot: SnapshotConfig,
}

/// Upstream endpoints and HTTP behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub trackerdb_url: String,
    pub trackers_csv_url: String,
    pub sites_trackers_csv_url: String,
    pub sites_csv_url: String,
    pub policy_catalog_url: String,
    /// Prefix joined with a policy record's `icon` to build its image URL.
    pub policy_icon_base: String,
    /// Search endpoint, called with a `query` parameter.
    pub review_search_url: String,
    /// Per-service detail endpoint, called with an `id` parameter.
    pub review_service_url: String,
    /// Listing endpoint, called with a `page` parameter.
    pub review_listing_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl SourcesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        SourcesConfig {
            trackerdb_url: "https://raw.githubusercontent.com/whotracksme/whotracks.me/master/whotracksme/data/assets/trackerdb.sql".to_string(),
            trackers_csv_url: "https://s3.amazonaws.com/data.whotracks.me/2025-09/us/trackers.csv".to_string(),
            sites_trackers_csv_url: "https://s3.amazonaws.com/data.whotracks.me/2025-09/us/sites_trackers.csv".to_string(),
            sites_csv_url: "https://s3.amazonaws.com/data.whotracks.me/2025-09/us/sites.csv".to_string(),
            policy_catalog_url: "https://privacyspy.org/api/v2/products.json".to_string(),
            policy_icon_base: "https://privacyspy.org/static/icons/".to_string(),
            review_search_url: "https://api.tosdr.org/search/v5/".to_string(),
            review_service_url: "https://api.tosdr.org/service/v3/".to_string(),
            review_listing_url: "https://api.tosdr.org/service/v3/".to_string(),
            timeout_secs: 10,
            user_agent: concat!("privacy-scope/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Entity-resolution knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub ratio_threshold: u8,
    pub partial_ratio_threshold: u8,
    pub max_parent_depth: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            ratio_threshold: DEFAULT_RATIO_THRESHOLD,
            partial_ratio_threshold: DEFAULT_PARTIAL_RATIO_THRESHOLD,
            max_parent_depth: DEFAULT_MAX_PARENT_DEPTH,
        }
    }
}

/// Paginated review-catalog enumeration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnumerationConfig {
    /// Pause between consecutive page requests.
    pub page_delay_ms: u64,
    /// Pause before retrying a page answered with 429.
    pub backoff_ms: u64,
    pub max_retries: u32,
    pub max_pages: u32,
    /// Case-insensitive name substrings excluded from the master list.
    pub denylist: Vec<String>,
}

impl EnumerationConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        let denylist = [
            "porn", "xxx", "xvideos", "xhamster", "redtube", "youporn", "brazzers",
            "chaturbate", "onlyfans", "google+",
        ];
        EnumerationConfig {
            page_delay_ms: 1_000,
            backoff_ms: 5_000,
            max_retries: 3,
            max_pages: 1_000,
            denylist: denylist.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Weights of the telemetry privacy-score model. Must sum to 1.0.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoreWeights {
    pub total_trackers: f64,
    pub ad_trackers: f64,
    pub companies: f64,
    pub tracked: f64,
    pub requests_tracking: f64,
    pub trackers_present: f64,
    pub referer_leaked: f64,
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.total_trackers
            + self.ad_trackers
            + self.companies
            + self.tracked
            + self.requests_tracking
            + self.trackers_present
            + self.referer_leaked
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights {
            total_trackers: 0.20,
            ad_trackers: 0.10,
            companies: 0.05,
            tracked: 0.20,
            requests_tracking: 0.15,
            trackers_present: 0.15,
            referer_leaked: 0.15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Age after which the `shell` command reloads the policy catalog.
    pub max_age_secs: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        SnapshotConfig { max_age_secs: 3_600 }
    }
}

/// Load the configuration, searching in order:
///
/// 1. `config_override` — path passed via `--config`
/// 2. `<project_path>/.privacy-scope/config.toml`
/// 3. `~/.config/privacy-scope/config.toml`
/// 4. Built-in [`Config::default`]
///
/// Whichever file is used is validated before it is returned.
pub fn load_config(project_path: &Path, config_override: Option<&Path>) -> Result<Config> {
    let config = match find_config_file(project_path, config_override) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content)?
        }
        None => Config::default(),
    };
    validate(&config)?;
    Ok(config)
}

fn find_config_file(project_path: &Path, config_override: Option<&Path>) -> Option<std::path::PathBuf> {
    if let Some(path) = config_override {
        return Some(path.to_path_buf());
    }

    let project_config = project_path.join(".privacy-scope").join("config.toml");
    if project_config.exists() {
        return Some(project_config);
    }

    let home_config = dirs::home_dir()?
        .join(".config")
        .join("privacy-scope")
        .join("config.toml");
    home_config.exists().then_some(home_config)
}

/// Reject configurations the scoring and resolution code cannot honour.
pub fn validate(config: &Config) -> Result<()> {
    let sum = config.weights.sum();
    if (sum - 1.0).abs() > 1e-6 {
        bail!("score weights must sum to 1.0 (got {sum:.6})");
    }
    let weights = &config.weights;
    let all = [
        weights.total_trackers,
        weights.ad_trackers,
        weights.companies,
        weights.tracked,
        weights.requests_tracking,
        weights.trackers_present,
        weights.referer_leaked,
    ];
    if all.iter().any(|w| *w < 0.0) {
        bail!("score weights must not be negative");
    }
    if config.resolver.ratio_threshold > 100 || config.resolver.partial_ratio_threshold > 100 {
        bail!("fuzzy-match thresholds are percentages and must be within 0..=100");
    }
    if config.resolver.max_parent_depth == 0 {
        bail!("resolver.max_parent_depth must be at least 1");
    }
    if config.sources.timeout_secs == 0 {
        bail!("sources.timeout_secs must be at least 1");
    }
    Ok(())
}

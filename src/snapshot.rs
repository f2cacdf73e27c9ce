//! Immutable reference data shared by every query of a process: the policy
//! rubric catalog. Built explicitly, passed by reference, replaced wholesale
//! through [`ReferenceData::reload`].

use std::time::{Duration, Instant};

use crate::config::SourcesConfig;
use crate::models::PolicyRecord;
use crate::resolve::policy::PolicyCatalog;
use crate::source::policy::fetch_catalog;
use crate::source::{Fetcher, SourceError};

#[derive(Debug, Clone)]
pub struct ReferenceData {
    catalog: PolicyCatalog,
    skipped_records: usize,
    loaded_at: Instant,
}

impl ReferenceData {
    pub fn from_records(records: Vec<PolicyRecord>, skipped_records: usize) -> Self {
        ReferenceData {
            catalog: PolicyCatalog::new(records),
            skipped_records,
            loaded_at: Instant::now(),
        }
    }

    /// Fetch the policy catalog and build a snapshot from it.
    pub async fn load(fetcher: &Fetcher, config: &SourcesConfig) -> Result<Self, SourceError> {
        let (records, skipped) = fetch_catalog(fetcher, &config.policy_catalog_url).await?;
        tracing::info!(records = records.len(), skipped, "policy catalog loaded");
        Ok(Self::from_records(records, skipped))
    }

    /// Build a fresh snapshot. On failure the caller keeps using `self`.
    pub async fn reload(&self, fetcher: &Fetcher, config: &SourcesConfig) -> Result<Self, SourceError> {
        tracing::info!(age_secs = self.age().as_secs(), "reloading policy catalog");
        Self::load(fetcher, config).await
    }

    pub fn catalog(&self) -> &PolicyCatalog {
        &self.catalog
    }

    pub fn skipped_records(&self) -> usize {
        self.skipped_records
    }

    pub fn age(&self) -> Duration {
        self.loaded_at.elapsed()
    }

    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.age() >= max_age
    }
}

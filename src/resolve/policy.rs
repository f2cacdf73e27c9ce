use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::fuzzy::{partial_ratio, ratio};
use super::{first_token, Resolution};
use crate::config::ResolverConfig;
use crate::models::PolicyRecord;

/// The rubric catalog with a slug index for parent lookups.
#[derive(Debug, Clone, Default)]
pub struct PolicyCatalog {
    records: Vec<PolicyRecord>,
    by_slug: HashMap<String, usize>,
}

impl PolicyCatalog {
    pub fn new(records: Vec<PolicyRecord>) -> Self {
        let mut by_slug = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            by_slug.entry(record.slug.clone()).or_insert(i);
        }
        PolicyCatalog { records, by_slug }
    }

    pub fn records(&self) -> &[PolicyRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn by_slug(&self, slug: &str) -> Option<&PolicyRecord> {
        self.by_slug.get(slug).map(|i| &self.records[*i])
    }
}

/// How the query was matched to a catalog record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchKind {
    Name,
    Hostname,
    Fuzzy { ratio: u8, partial_ratio: u8 },
}

/// A resolved rubric record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyMatch {
    /// The record holding the authoritative score (root of the parent chain).
    pub record: PolicyRecord,
    /// Slug of the record the query matched before parent traversal.
    pub matched_slug: String,
    /// Slugs walked from the matched record up to `record`, inclusive.
    pub chain: Vec<String>,
    pub kind: MatchKind,
}

/// Resolves queries against a [`PolicyCatalog`] snapshot.
pub struct PolicyResolver<'a> {
    catalog: &'a PolicyCatalog,
    config: &'a ResolverConfig,
}

impl<'a> PolicyResolver<'a> {
    pub fn new(catalog: &'a PolicyCatalog, config: &'a ResolverConfig) -> Self {
        PolicyResolver { catalog, config }
    }

    /// Exact name or hostname match first, then the first fuzzy match, then
    /// parent traversal. Deterministic for a fixed catalog and query.
    pub fn resolve(&self, query: &str) -> Resolution<PolicyMatch> {
        let query = query.trim();
        if query.is_empty() {
            return Resolution::NotFound;
        }

        let Some((start, kind)) = self.exact_match(query).or_else(|| self.fuzzy_match(query)) else {
            tracing::debug!(query, "no rubric record matched");
            return Resolution::NotFound;
        };

        let matched = &self.catalog.records[start];
        tracing::debug!(query, slug = %matched.slug, ?kind, "rubric record matched");

        match self.follow_parents(start) {
            Ok((root, chain)) => Resolution::Resolved(PolicyMatch {
                record: self.catalog.records[root].clone(),
                matched_slug: matched.slug.clone(),
                chain,
                kind,
            }),
            Err(reason) => {
                tracing::warn!(query, %reason, "rejecting parent chain");
                Resolution::Malformed(reason)
            }
        }
    }

    fn exact_match(&self, query: &str) -> Option<(usize, MatchKind)> {
        self.catalog.records.iter().enumerate().find_map(|(i, record)| {
            if record.name.eq_ignore_ascii_case(query) {
                Some((i, MatchKind::Name))
            } else if record.hostnames.iter().any(|h| h.eq_ignore_ascii_case(query)) {
                Some((i, MatchKind::Hostname))
            } else {
                None
            }
        })
    }

    fn fuzzy_match(&self, query: &str) -> Option<(usize, MatchKind)> {
        let token = first_token(query);
        if token.is_empty() {
            return None;
        }
        let lowered = query.to_lowercase();

        self.catalog.records.iter().enumerate().find_map(|(i, record)| {
            let name = record.name.to_lowercase();
            if !name.contains(&token) {
                return None;
            }
            let full = ratio(&lowered, &name);
            let partial = partial_ratio(&lowered, &name);
            (full >= self.config.ratio_threshold && partial >= self.config.partial_ratio_threshold).then_some((
                i,
                MatchKind::Fuzzy {
                    ratio: full,
                    partial_ratio: partial,
                },
            ))
        })
    }

    /// Walk `parent_slug` pointers to the root. Cycles and chains longer than
    /// `max_parent_depth` are rejected. A parent slug missing from the
    /// catalog ends the walk at the last record found.
    fn follow_parents(&self, start: usize) -> Result<(usize, Vec<String>), String> {
        let mut current = start;
        let mut chain = vec![self.catalog.records[start].slug.clone()];
        let mut visited: HashSet<&str> = HashSet::from([self.catalog.records[start].slug.as_str()]);

        while let Some(parent) = self.catalog.records[current].parent_slug.as_deref() {
            if !visited.insert(parent) {
                return Err(format!("parent chain cycle at `{parent}` ({})", chain.join(" -> ")));
            }
            if chain.len() > self.config.max_parent_depth {
                return Err(format!(
                    "parent chain exceeds {} hops ({})",
                    self.config.max_parent_depth,
                    chain.join(" -> ")
                ));
            }
            match self.catalog.by_slug.get(parent) {
                Some(next) => {
                    current = *next;
                    chain.push(parent.to_string());
                }
                None => {
                    tracing::warn!(parent, "parent slug not in catalog; stopping at child");
                    break;
                }
            }
        }
        Ok((current, chain))
    }
}

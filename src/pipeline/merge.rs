use std::collections::HashMap;

use crate::models::TrackerFact;
use crate::source::taxonomy::TaxonomyRow;
use crate::source::telemetry::{SiteTrackerRow, TrackerReachRow};

/// Join site/tracker observations with the taxonomy (by tracker id) and the
/// reach table (by tracker). Left-join semantics: every observation yields a
/// fact, with `None` where the other side has no row.
pub fn merge_trackers(
    observations: &[SiteTrackerRow],
    taxonomy: &[TaxonomyRow],
    reach: &[TrackerReachRow],
) -> Vec<TrackerFact> {
    // First row wins on duplicate keys.
    let mut by_id: HashMap<&str, &TaxonomyRow> = HashMap::with_capacity(taxonomy.len());
    for row in taxonomy {
        by_id.entry(row.tracker_id.as_str()).or_insert(row);
    }
    let mut reach_by_tracker: HashMap<&str, &TrackerReachRow> = HashMap::with_capacity(reach.len());
    for row in reach {
        reach_by_tracker.entry(row.tracker.as_str()).or_insert(row);
    }

    observations
        .iter()
        .map(|obs| {
            let taxon = by_id.get(obs.tracker.as_str());
            let reach = reach_by_tracker.get(obs.tracker.as_str());
            TrackerFact {
                site: obs.site.clone(),
                tracker_id: obs.tracker.clone(),
                tracker_name: taxon.and_then(|t| t.tracker_name.clone()),
                category: taxon
                    .and_then(|t| t.category.as_deref())
                    .map(normalize_category),
                owning_company: taxon.and_then(|t| t.company_name.clone()),
                reach: reach.and_then(|r| r.reach),
                site_reach_top10k: reach.and_then(|r| r.site_reach_top10k),
            }
        })
        .collect()
}

/// `site_analytics` → `Site Analytics`.
pub fn normalize_category(raw: &str) -> String {
    title_case(&raw.replace('_', " "))
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_is_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_alpha = true;
        } else {
            out.push(c);
            prev_is_alpha = false;
        }
    }
    out
}

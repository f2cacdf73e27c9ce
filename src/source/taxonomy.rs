//! The tracker taxonomy ships as a SQL dump (`trackers`, `categories`,
//! `companies`). It is replayed into an in-memory SQLite database and read
//! back through a left join so trackers without a category or owner survive.

use rusqlite::Connection;

use super::{Fetcher, SourceError};

/// Tracker id → display name, category and owning company.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxonomyRow {
    pub tracker_id: String,
    pub tracker_name: Option<String>,
    pub category: Option<String>,
    pub company_name: Option<String>,
}

const TAXONOMY_QUERY: &str = "
    SELECT
        t.id   AS tracker_id,
        t.name AS tracker_name,
        c.name AS category,
        comp.name AS company_name
    FROM trackers t
    LEFT JOIN categories c ON t.category_id = c.id
    LEFT JOIN companies comp ON t.company_id = comp.id";

/// Execute `script` into a fresh in-memory database and extract the taxonomy.
///
/// Returns the rows plus the number of rows whose id could not be read.
pub fn load_taxonomy(script: &str) -> Result<(Vec<TaxonomyRow>, usize), SourceError> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(script)?;

    let mut stmt = conn.prepare(TAXONOMY_QUERY)?;
    let mut rows = stmt.query([])?;

    let mut taxonomy = Vec::new();
    let mut skipped = 0;
    while let Some(row) = rows.next()? {
        // Ids are TEXT in the dump; a NULL or non-text id cannot be joined on.
        let tracker_id: Option<String> = row.get(0).ok().flatten();
        let Some(tracker_id) = tracker_id else {
            skipped += 1;
            continue;
        };
        taxonomy.push(TaxonomyRow {
            tracker_id,
            tracker_name: row.get(1).ok().flatten(),
            category: row.get(2).ok().flatten(),
            company_name: row.get(3).ok().flatten(),
        });
    }

    tracing::debug!(rows = taxonomy.len(), skipped, "taxonomy loaded");
    Ok((taxonomy, skipped))
}

/// Download the SQL dump and load it.
pub async fn fetch_taxonomy(fetcher: &Fetcher, url: &str) -> Result<(Vec<TaxonomyRow>, usize), SourceError> {
    let script = fetcher.get_text(url).await?;
    tokio::task::spawn_blocking(move || load_taxonomy(&script))
        .await
        .map_err(|e| SourceError::Malformed(format!("taxonomy loader panicked: {e}")))?
}

//! Report renderers.
//!
//! - [`terminal`] — colored tables for lookups, site metrics and domain lists;
//!   respects `--verbose` / `--quiet`.
//! - [`json`] — the same data as pretty-printed JSON for scripting.
//!
//! [`status_line`] turns a catalog [`Resolution`] into the message shown in
//! place of a record, so both renderers agree on the wording.

pub mod json;
pub mod terminal;

use crate::resolve::Resolution;

/// Which catalog a resolution came from; the "nothing found" wording differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Catalog {
    Policy,
    Review,
}

/// Display message for anything other than a resolved record.
pub fn status_line<T>(catalog: Catalog, resolution: &Resolution<T>, query: &str) -> Option<String> {
    let line = match resolution {
        Resolution::Resolved(_) => return None,
        Resolution::NotFound => match catalog {
            Catalog::Policy => format!("Scores for {query} are currently unavailable"),
            Catalog::Review => format!("No match for {query}, try a different search"),
        },
        Resolution::RateLimited => "Too many requests, try again shortly".to_string(),
        Resolution::TransportFailure(reason) => format!("Data unavailable ({reason})"),
        Resolution::Timeout => "Data unavailable (request timed out)".to_string(),
        Resolution::Cancelled => "Lookup cancelled".to_string(),
        Resolution::Malformed(reason) => format!("Data unavailable ({reason})"),
    };
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_wording_differs_per_catalog() {
        let r: Resolution<()> = Resolution::NotFound;
        let policy = status_line(Catalog::Policy, &r, "acme").unwrap();
        let review = status_line(Catalog::Review, &r, "acme").unwrap();
        assert_eq!(policy, "Scores for acme are currently unavailable");
        assert!(review.starts_with("No match for acme"));
    }

    #[test]
    fn test_rate_limited_is_not_absence() {
        let r: Resolution<()> = Resolution::RateLimited;
        let line = status_line(Catalog::Review, &r, "acme").unwrap();
        assert!(line.starts_with("Too many requests"));
        assert_eq!(status_line(Catalog::Review, &Resolution::Resolved(()), "acme"), None);
    }
}

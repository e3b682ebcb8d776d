//! New-listing detection.
//!
//! A candidate is new when its id has never been stored for the search.
//! Field changes on known ids are not reported; the upsert absorbs them.

use std::collections::HashSet;

use crate::models::CandidateAd;

/// Candidates whose id is not in `stored_ids`, in page order.
///
/// When a page lists the same id twice only the first occurrence is kept.
pub fn diff(current: &[CandidateAd], stored_ids: &HashSet<String>) -> Vec<CandidateAd> {
    let mut seen: HashSet<&str> = HashSet::new();
    current
        .iter()
        .filter(|ad| !stored_ids.contains(&ad.id))
        .filter(|ad| seen.insert(ad.id.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_ad(id: &str, title: &str) -> CandidateAd {
        CandidateAd {
            id: id.to_string(),
            title: Some(title.to_string()),
            url: format!("https://example.com/{}", id),
            ..CandidateAd::default()
        }
    }

    fn ids(ads: &[CandidateAd]) -> Vec<&str> {
        ads.iter().map(|a| a.id.as_str()).collect()
    }

    fn stored(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_store_everything_new() {
        let current = vec![make_ad("001", "A"), make_ad("002", "B")];
        assert_eq!(ids(&diff(&current, &HashSet::new())), vec!["001", "002"]);
    }

    #[test]
    fn test_only_unknown_ids() {
        let current = vec![make_ad("001", "A"), make_ad("002", "B"), make_ad("003", "C")];
        let result = diff(&current, &stored(&["002"]));
        assert_eq!(ids(&result), vec!["001", "003"]);
    }

    #[test]
    fn test_changed_fields_not_reported() {
        let current = vec![make_ad("001", "Renamed")];
        assert!(diff(&current, &stored(&["001"])).is_empty());
    }

    #[test]
    fn test_rediff_after_store_is_empty() {
        let current = vec![make_ad("001", "A"), make_ad("004", "D")];
        let mut known = stored(&["001", "002"]);

        let first = diff(&current, &known);
        assert_eq!(ids(&first), vec!["004"]);

        known.extend(first.iter().map(|a| a.id.clone()));
        assert!(diff(&current, &known).is_empty());
    }

    #[test]
    fn test_duplicate_ids_reported_once() {
        let current = vec![make_ad("001", "A"), make_ad("001", "A again")];
        let result = diff(&current, &HashSet::new());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].title.as_deref(), Some("A"));
    }

    #[test]
    fn test_empty_page() {
        assert!(diff(&[], &stored(&["001"])).is_empty());
    }
}

//! Ad data structures.
//!
//! A [`CandidateAd`] is what the parser extracts from one listing page; an
//! [`Ad`] is the row persisted for a search. Fields the parser could not
//! recognize are `None`; the sentinel text is only produced when rendering
//! or persisting.

use serde::{Deserialize, Serialize};

use super::SearchId;

/// Sentinel for any field the parser did not recognize.
pub const NOT_SPECIFIED: &str = "not specified";

/// Sentinel title for rows without a title anchor.
pub const NO_TITLE: &str = "no title";

/// An ad parsed from a listing page, not yet compared against storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CandidateAd {
    /// Identifier within the listing source
    pub id: String,

    /// Anchor text of the row's title link
    pub title: Option<String>,

    /// Absolute link to the ad, empty when the row has no title anchor
    pub url: String,

    /// Price cell text (contains the currency marker)
    pub price: Option<String>,

    /// Model year cell text
    pub year: Option<String>,

    /// Fuel / engine type cell text
    pub engine: Option<String>,

    /// Transmission cell text
    pub transmission: Option<String>,

    /// Posted date cell text
    pub posted_date: Option<String>,
}

impl CandidateAd {
    /// Title for display, falling back to the sentinel.
    pub fn title_or_default(&self) -> &str {
        self.title.as_deref().unwrap_or(NO_TITLE)
    }

    /// Rows with neither a title nor a link carry nothing worth sending.
    pub fn is_degenerate(&self) -> bool {
        self.title.is_none() && self.url.is_empty()
    }
}

/// An ad row stored for a search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ad {
    pub id: String,
    pub search_id: SearchId,
    pub title: String,
    pub price: String,
    pub url: String,
    pub date_posted: String,
    pub is_new: bool,
}

impl Ad {
    /// Build the stored row for a candidate, rendering absent fields as sentinels.
    pub fn from_candidate(search_id: SearchId, candidate: &CandidateAd, is_new: bool) -> Self {
        Self {
            id: candidate.id.clone(),
            search_id,
            title: candidate.title_or_default().to_string(),
            price: or_sentinel(&candidate.price),
            url: candidate.url.clone(),
            date_posted: or_sentinel(&candidate.posted_date),
            is_new,
        }
    }
}

fn or_sentinel(value: &Option<String>) -> String {
    value.as_deref().unwrap_or(NOT_SPECIFIED).to_string()
}

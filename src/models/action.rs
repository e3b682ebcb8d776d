//! Named actions attached to outgoing messages as buttons.
//!
//! Actions travel through the messaging channel as short callback strings,
//! e.g. `year_yes`, `subscribe_vip`, `delete_search_42`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{SearchId, SubscriptionTier};
use crate::error::AppError;

/// Something the user can trigger by pressing a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NamedAction {
    YearFilter(bool),
    PriceFilter(bool),
    Subscribe(SubscriptionTier),
    DeleteSearch(SearchId),
    StartNewSearch,
}

impl fmt::Display for NamedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let yes_no = |b: bool| if b { "yes" } else { "no" };
        match self {
            NamedAction::YearFilter(b) => write!(f, "year_{}", yes_no(*b)),
            NamedAction::PriceFilter(b) => write!(f, "price_{}", yes_no(*b)),
            NamedAction::Subscribe(tier) => write!(f, "subscribe_{tier}"),
            NamedAction::DeleteSearch(id) => write!(f, "delete_search_{id}"),
            NamedAction::StartNewSearch => f.write_str("start_new_search"),
        }
    }
}

impl FromStr for NamedAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let yes_no = |v: &str| match v {
            "yes" => Ok(true),
            "no" => Ok(false),
            _ => Err(AppError::malformed(format!("expected yes/no in '{s}'"))),
        };

        if s == "start_new_search" {
            return Ok(NamedAction::StartNewSearch);
        }
        if let Some(rest) = s.strip_prefix("delete_search_") {
            let id = rest
                .parse()
                .map_err(|_| AppError::malformed(format!("bad search id in '{s}'")))?;
            return Ok(NamedAction::DeleteSearch(id));
        }
        if let Some(rest) = s.strip_prefix("subscribe_") {
            return Ok(NamedAction::Subscribe(rest.parse()?));
        }
        if let Some(rest) = s.strip_prefix("year_") {
            return Ok(NamedAction::YearFilter(yes_no(rest)?));
        }
        if let Some(rest) = s.strip_prefix("price_") {
            return Ok(NamedAction::PriceFilter(yes_no(rest)?));
        }
        Err(AppError::malformed(format!("unknown action '{s}'")))
    }
}

/// A labelled button carrying a named action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub action: NamedAction,
}

impl Button {
    pub fn new(label: impl Into<String>, action: NamedAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

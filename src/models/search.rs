//! Search filters registered by users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{SearchId, UserId};

/// Inclusive numeric bounds, either side optional.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Range {
    pub from: Option<u32>,
    pub to: Option<u32>,
}

impl Range {
    pub fn new(from: Option<u32>, to: Option<u32>) -> Self {
        Self { from, to }
    }

    /// True when neither bound is set.
    pub fn is_open(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// Parse a "from to" reply. One number sets only the lower bound.
    ///
    /// Returns `None` for empty input, non-numeric tokens or more than two numbers.
    pub fn parse_pair(input: &str) -> Option<Self> {
        let mut parts = input.split_whitespace();
        let from = parts.next()?.parse().ok()?;
        let to = match parts.next() {
            Some(token) => Some(token.parse().ok()?),
            None => None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(Some(from), to))
    }

    /// Render as `from-to`, using `any` for missing bounds.
    pub fn describe(&self, any: &str) -> String {
        let side = |v: Option<u32>| v.map_or_else(|| any.to_string(), |n| n.to_string());
        format!("{}-{}", side(self.from), side(self.to))
    }
}

/// What a search asks the listing source for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchDescriptor {
    pub category: String,
    pub make: String,
    pub model: String,
    #[serde(default)]
    pub year: Range,
    #[serde(default)]
    pub price: Range,
}

impl SearchDescriptor {
    pub fn new(category: impl Into<String>, make: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            make: make.into(),
            model: model.into(),
            year: Range::default(),
            price: Range::default(),
        }
    }

    pub fn with_year(mut self, year: Range) -> Self {
        self.year = year;
        self
    }

    pub fn with_price(mut self, price: Range) -> Self {
        self.price = price;
        self
    }

    /// Short label used in logs.
    pub fn label(&self) -> String {
        format!("{} {}", self.make, self.model)
    }
}

/// A stored search owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Search {
    pub id: SearchId,
    pub user_id: UserId,
    #[serde(flatten)]
    pub descriptor: SearchDescriptor,
    pub last_checked: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            Range::parse_pair("2010 2020"),
            Some(Range::new(Some(2010), Some(2020)))
        );
        assert_eq!(Range::parse_pair(" 5000 "), Some(Range::new(Some(5000), None)));
        assert_eq!(Range::parse_pair(""), None);
        assert_eq!(Range::parse_pair("abc 2020"), None);
        assert_eq!(Range::parse_pair("2010 x"), None);
        assert_eq!(Range::parse_pair("1 2 3"), None);
    }

    #[test]
    fn test_describe() {
        assert_eq!(Range::new(Some(2010), None).describe("any"), "2010-any");
        assert!(Range::default().is_open());
    }

    #[test]
    fn test_descriptor_builder() {
        let d = SearchDescriptor::new("cars", "Audi", "A4").with_year(Range::new(Some(2015), None));
        assert_eq!(d.label(), "Audi A4");
        assert_eq!(d.year.from, Some(2015));
        assert!(d.price.is_open());
    }
}

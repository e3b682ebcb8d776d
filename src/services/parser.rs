//! Listing page parser.
//!
//! Listing tables do not put each attribute in a fixed column, so cells are
//! classified by their content. Classification runs an ordered rule list and
//! the first matching rule decides the field of a cell.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{CandidateAd, ParserConfig};
use crate::utils::{normalize_whitespace, resolve_url};

/// Field a data cell was recognized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellField {
    Price,
    Year,
    Engine,
    Transmission,
    PostedDate,
}

/// A classification rule: the first rule whose predicate accepts the cell wins.
pub struct Rule {
    pub field: CellField,
    predicate: fn(&str) -> bool,
}

impl Rule {
    pub fn matches(&self, text: &str) -> bool {
        (self.predicate)(text)
    }
}

const CURRENCY_MARKERS: &[char] = &['€'];

const ENGINE_TOKENS: &[&str] = &[
    "d", "b", "b/g", "benzīns", "dīzelis", "benzins", "dizelis", "hibrīds", "hibrids",
    "elektro", "petrol", "diesel", "hybrid", "electric", "бензин", "дизель", "гибрид",
];

const TRANSMISSION_TOKENS: &[&str] = &[
    "a", "m", "automāts", "manuāla", "automats", "manuala", "automatic", "manual",
    "автомат", "механика",
];

const DATE_SEPARATOR: char = '.';
const DATE_MIN_LEN: usize = 8;
const YEAR_RANGE: std::ops::RangeInclusive<u32> = 1900..=2099;

/// Classification rules in precedence order.
pub const RULES: &[Rule] = &[
    Rule {
        field: CellField::Price,
        predicate: is_price,
    },
    Rule {
        field: CellField::Year,
        predicate: is_year,
    },
    Rule {
        field: CellField::Engine,
        predicate: is_engine,
    },
    Rule {
        field: CellField::Transmission,
        predicate: is_transmission,
    },
    Rule {
        field: CellField::PostedDate,
        predicate: is_posted_date,
    },
];

/// Classify one cell's text. `None` means the cell is ignored.
pub fn classify(text: &str) -> Option<CellField> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    RULES.iter().find(|rule| rule.matches(text)).map(|rule| rule.field)
}

fn is_price(text: &str) -> bool {
    text.contains(CURRENCY_MARKERS)
}

fn is_year(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii_digit())
        && text.parse::<u32>().is_ok_and(|year| YEAR_RANGE.contains(&year))
}

fn is_engine(text: &str) -> bool {
    matches_token(text, ENGINE_TOKENS)
}

fn is_transmission(text: &str) -> bool {
    matches_token(text, TRANSMISSION_TOKENS)
}

fn is_posted_date(text: &str) -> bool {
    text.contains(DATE_SEPARATOR) && text.chars().count() >= DATE_MIN_LEN
}

/// Case-insensitive token match.
///
/// Short tokens (one or two letters) must be a whole word of the cell, since
/// as substrings they would match almost anything. A letter glued to a
/// number starts a new word, so `2.0D` yields `d`. Longer tokens may appear
/// anywhere in the cell.
fn matches_token(text: &str, tokens: &[&str]) -> bool {
    let lower = text.to_lowercase();
    let words = split_words(&lower);

    tokens.iter().any(|token| {
        if token.chars().count() <= 2 || token.contains('/') {
            words.iter().any(|w| w == token)
        } else {
            lower.contains(token)
        }
    })
}

/// Split on whitespace and commas, and between a digit and a following letter.
fn split_words(text: &str) -> Vec<&str> {
    let mut words = Vec::new();
    for chunk in text.split(|c: char| c.is_whitespace() || c == ',') {
        let mut start = 0;
        let mut prev_digit = false;
        for (i, c) in chunk.char_indices() {
            if prev_digit && c.is_alphabetic() {
                words.push(&chunk[start..i]);
                start = i;
            }
            prev_digit = c.is_ascii_digit();
        }
        words.push(&chunk[start..]);
    }
    words.retain(|w| !w.is_empty());
    words
}

/// Parses listing pages into candidate ads.
pub struct AdParser {
    row_sel: Selector,
    title_sel: Selector,
    cell_sel: Selector,
    id_prefix: String,
    promo_marker: String,
    attr_name: String,
    base_url: Url,
}

impl AdParser {
    /// Compile the configured selectors.
    pub fn new(config: &ParserConfig, base_url: &str) -> Result<Self> {
        Ok(Self {
            row_sel: Self::parse_selector(&config.row_selector)?,
            title_sel: Self::parse_selector(&config.title_selector)?,
            cell_sel: Self::parse_selector(&config.cell_selector)?,
            id_prefix: config.id_prefix.clone(),
            promo_marker: config.promo_marker.clone(),
            attr_name: config.attr_name.clone(),
            base_url: Url::parse(base_url)?,
        })
    }

    /// Extract candidate ads in page order.
    ///
    /// Input that is not markup at all is reported as a parse error; callers
    /// treat that as an empty page.
    pub fn parse(&self, html: &str) -> Result<Vec<CandidateAd>> {
        if html.trim().is_empty() {
            return Err(AppError::parse("empty document"));
        }
        if !html.contains('<') {
            return Err(AppError::parse("document contains no markup"));
        }

        let document = Html::parse_document(html);
        let ads: Vec<CandidateAd> = document
            .select(&self.row_sel)
            .filter_map(|row| self.parse_row(&row))
            .collect();

        log::debug!("Parsed {} candidate ads", ads.len());
        Ok(ads)
    }

    fn parse_row(&self, row: &ElementRef) -> Option<CandidateAd> {
        let row_id = row.value().attr("id")?;
        if row_id.contains(&self.promo_marker) {
            log::debug!("Skipping promotional row {}", row_id);
            return None;
        }

        let id = row_id.strip_prefix(&self.id_prefix).unwrap_or(row_id).trim();
        if id.is_empty() {
            return None;
        }

        let mut ad = CandidateAd {
            id: id.to_string(),
            ..CandidateAd::default()
        };

        if let Some(anchor) = row.select(&self.title_sel).next() {
            let title: String = anchor.text().collect();
            ad.title = Some(normalize_whitespace(&title));
            ad.url = anchor
                .value()
                .attr(&self.attr_name)
                .map(|href| resolve_url(&self.base_url, href))
                .unwrap_or_default();
        }

        for cell in row.select(&self.cell_sel) {
            let text = normalize_whitespace(&cell.text().collect::<String>());
            let Some(field) = classify(&text) else {
                continue;
            };
            let slot = match field {
                CellField::Price => &mut ad.price,
                CellField::Year => &mut ad.year,
                CellField::Engine => &mut ad.engine,
                CellField::Transmission => &mut ad.transmission,
                CellField::PostedDate => &mut ad.posted_date,
            };
            if slot.is_none() {
                *slot = Some(text);
            }
        }

        Some(ad)
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}

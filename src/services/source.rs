//! Listing source abstraction.
//!
//! The poller only knows [`ListingSource`]. How a search becomes a request
//! is the job of a [`QueryEncoder`], so a different site grammar means a new
//! encoder, not a change to the polling code.

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{SearchDescriptor, SourceConfig};
use crate::utils::slugify;

/// Something that returns the raw listing HTML for a search.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch(&self, query: &SearchDescriptor) -> Result<String>;
}

/// Turns a search into the URL of its listing page.
pub trait QueryEncoder: Send + Sync {
    fn encode(&self, query: &SearchDescriptor) -> Result<Url>;
}

/// Path-style encoder: `{base}{listing_path}` followed, when any filter is
/// set, by `{filter_segment}key=value&key=value/`.
#[derive(Debug, Clone)]
pub struct PathQueryEncoder {
    base: Url,
    listing_path: String,
    filter_segment: String,
}

impl PathQueryEncoder {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            base: Url::parse(&config.base_url)?,
            listing_path: config.listing_path.clone(),
            filter_segment: config.filter_segment.clone(),
        })
    }

    /// One path segment from user-supplied text. Dot-only segments would
    /// walk the path, so they are refused.
    fn segment(value: &str) -> Result<String> {
        let slug = slugify(value).replace('/', "-");
        if slug.chars().all(|c| c == '.') {
            return Err(AppError::validation(format!(
                "'{value}' cannot be used in a listing path"
            )));
        }
        Ok(slug)
    }

    fn filters(query: &SearchDescriptor) -> Vec<String> {
        [
            ("year_from", query.year.from),
            ("year_to", query.year.to),
            ("price_from", query.price.from),
            ("price_to", query.price.to),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| format!("{key}={v}")))
        .collect()
    }
}

impl QueryEncoder for PathQueryEncoder {
    /// Segments are pushed one at a time, so `?`, `#` and `%` in user text
    /// are percent-encoded instead of ending the path.
    fn encode(&self, query: &SearchDescriptor) -> Result<Url> {
        let category = Self::segment(&query.category)?;
        let make = Self::segment(&query.make)?;
        let model = Self::segment(&query.model)?;
        let filters = Self::filters(query);

        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| AppError::config("source.base_url cannot carry a path"))?;
            segments.clear();

            for part in self.listing_path.split('/').filter(|p| !p.is_empty()) {
                let part = part
                    .replace("{category}", &category)
                    .replace("{make}", &make)
                    .replace("{model}", &model);
                segments.push(&part);
            }

            if !filters.is_empty() {
                for part in self.filter_segment.split('/').filter(|p| !p.is_empty()) {
                    segments.push(part);
                }
                segments.push(&filters.join("&"));
                segments.push("");
            } else if self.listing_path.ends_with('/') {
                segments.push("");
            }
        }

        Ok(url)
    }
}

/// Listing source backed by HTTP GET requests.
pub struct HttpListingSource {
    client: Client,
    encoder: Box<dyn QueryEncoder>,
}

impl HttpListingSource {
    pub fn new(client: Client, encoder: Box<dyn QueryEncoder>) -> Self {
        Self { client, encoder }
    }
}

#[async_trait]
impl ListingSource for HttpListingSource {
    async fn fetch(&self, query: &SearchDescriptor) -> Result<String> {
        let url = self.encoder.encode(query)?;
        log::debug!("Fetching {} from {}", query.label(), url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AppError::fetch(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(url.as_str(), format!("status {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::fetch(url.as_str(), e))
    }
}

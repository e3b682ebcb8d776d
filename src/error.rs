// src/error.rs

//! Unified error handling for the ad tracker.

use std::fmt;

use thiserror::Error;

/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Listing page could not be turned into candidates
    #[error("Parse error: {0}")]
    Parse(String),

    /// Listing source unreachable or returned a non-success status
    #[error("Fetch error for {context}: {message}")]
    Fetch { context: String, message: String },

    /// Referenced row does not exist (or no longer exists)
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Inbound payload missing expected fields
    #[error("Malformed interaction: {0}")]
    MalformedInteraction(String),

    /// Requester does not own the search it tried to modify
    #[error("User {user_id} does not own search {search_id}")]
    OwnershipViolation { user_id: i64, search_id: u64 },

    /// Subscription change not allowed by the tier state machine
    #[error("Cannot change subscription from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Messaging channel refused or failed a request
    #[error("Channel error: {0}")]
    Channel(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Create a fetch error with context.
    pub fn fetch(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Create a malformed interaction error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInteraction(message.into())
    }

    /// Create a channel error.
    pub fn channel(message: impl fmt::Display) -> Self {
        Self::Channel(message.to_string())
    }

    /// Whether this error means the referenced row is gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            AppError::not_found("search", 7).to_string(),
            "search 7 not found"
        );
        assert_eq!(
            AppError::fetch("bmw x5", "status 503").to_string(),
            "Fetch error for bmw x5: status 503"
        );
    }

    #[test]
    fn test_is_not_found() {
        assert!(AppError::not_found("user", 1).is_not_found());
        assert!(!AppError::parse("empty document").is_not_found());
    }
}

// src/models/mod.rs

//! Domain models for the ad tracker.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod action;
mod ad;
mod config;
mod search;
mod user;
mod wizard;

/// Messaging-channel identifier of a user.
pub type UserId = i64;

/// Store-generated identifier of a search.
pub type SearchId = u64;

// Re-export all public types
pub use action::{Button, NamedAction};
pub use ad::{Ad, CandidateAd, NOT_SPECIFIED, NO_TITLE};
pub use config::{
    Config, LoggingConfig, Messages, ParserConfig, PollerConfig, SourceConfig, StorageConfig,
    SubscriptionConfig, TelegramConfig, render,
};
pub use search::{Range, Search, SearchDescriptor};
pub use user::{SubscriptionTier, User};
pub use wizard::WizardState;

/// Counters for one polling cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CycleStats {
    pub searches: usize,
    pub skipped: usize,
    pub fetch_failures: usize,
    pub parse_failures: usize,
    pub candidates: usize,
    pub new_ads: usize,
    pub notified: usize,
    pub suppressed: usize,
    pub send_failures: usize,
}

//! Storage abstractions for users, searches and ads.
//!
//! The logical schema, independent of the backend:
//!
//! ```text
//! users    (user_id, subscription_type, subscription_expiry)
//! searches (search_id, user_id → users, category, make, model,
//!           year_from, year_to, price_from, price_to, last_checked)
//! ads      (ad_id, search_id → searches, title, price, url, date_posted, is_new)
//! ```
//!
//! Ads are keyed by `(search_id, ad_id)`: the same listing may be tracked by
//! several searches. Wizard sessions are stored alongside so a half-finished
//! search survives a restart.
//!
//! Every method is atomic on its own; callers get no multi-call transaction.

pub mod local;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    Ad, Search, SearchDescriptor, SearchId, SubscriptionTier, User, UserId, WizardState,
};

// Re-export for convenience
pub use local::LocalStore;

/// Trait for persistence backends.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch a user, creating a free-tier one on first contact.
    async fn ensure_user(&self, user_id: UserId) -> Result<User>;

    async fn get_user(&self, user_id: UserId) -> Result<Option<User>>;

    /// Change a user's tier and expiry. Fails with `NotFound` for unknown users.
    async fn set_subscription(
        &self,
        user_id: UserId,
        tier: SubscriptionTier,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<User>;

    async fn count_searches(&self, user_id: UserId) -> Result<usize>;

    /// Insert a search with a generated id.
    async fn create_search(&self, user_id: UserId, descriptor: SearchDescriptor) -> Result<Search>;

    async fn get_search(&self, search_id: SearchId) -> Result<Option<Search>>;

    /// All searches, ordered by id.
    async fn list_searches(&self) -> Result<Vec<Search>>;

    /// Searches owned by one user, ordered by id.
    async fn searches_for_user(&self, user_id: UserId) -> Result<Vec<Search>>;

    /// Delete a search and its ads. Returns `false` when it did not exist.
    async fn delete_search(&self, search_id: SearchId) -> Result<bool>;

    /// Set the last-checked time. Returns `false` when the search is gone.
    async fn touch_search(&self, search_id: SearchId, at: DateTime<Utc>) -> Result<bool>;

    async fn stored_ad_ids(&self, search_id: SearchId) -> Result<HashSet<String>>;

    /// Insert or replace ads by id. Fails with `NotFound` when the search is gone.
    async fn upsert_ads(&self, search_id: SearchId, ads: &[Ad]) -> Result<()>;

    async fn ads_for_search(&self, search_id: SearchId) -> Result<Vec<Ad>>;

    async fn load_wizard(&self, user_id: UserId) -> Result<Option<WizardState>>;

    async fn save_wizard(&self, user_id: UserId, state: &WizardState) -> Result<()>;

    async fn clear_wizard(&self, user_id: UserId) -> Result<()>;
}

//! Local filesystem storage implementation.
//!
//! All tables live in one JSON document that is rewritten atomically (temp
//! file, then rename) after every mutation. A tokio mutex serializes access,
//! so each trait call is atomic with respect to the others. A write that
//! cannot be persisted leaves the in-memory tables untouched.
//!
//! Every mutation copies and rewrites the whole document, so one poll cycle
//! costs O(searches × stored ads). That is fine for a single bot's user base;
//! a larger deployment wants a `Store` backed by a real database.
//!
//! ## File Layout
//!
//! ```text
//! {
//!   "next_search_id": 3,
//!   "users":    { "<user_id>": { ... } },
//!   "searches": { "<search_id>": { ... } },
//!   "ads":      { "<search_id>": { "<ad_id>": { ... } } },
//!   "wizards":  { "<user_id>": { "step": "awaiting_model", ... } }
//! }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{
    Ad, Search, SearchDescriptor, SearchId, SubscriptionTier, User, UserId, WizardState,
};
use crate::storage::Store;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Tables {
    #[serde(default)]
    next_search_id: SearchId,
    #[serde(default)]
    users: BTreeMap<UserId, User>,
    #[serde(default)]
    searches: BTreeMap<SearchId, Search>,
    #[serde(default)]
    ads: BTreeMap<SearchId, BTreeMap<String, Ad>>,
    #[serde(default)]
    wizards: BTreeMap<UserId, WizardState>,
}

/// JSON-file storage backend.
pub struct LocalStore {
    path: Option<PathBuf>,
    tables: Mutex<Tables>,
}

impl LocalStore {
    /// Open (or create on first write) the database file at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let tables = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Tables::default(),
            Err(e) => return Err(AppError::Io(e)),
        };

        log::info!(
            "Opened database {} ({} users, {} searches)",
            path.display(),
            tables.users.len(),
            tables.searches.len()
        );

        Ok(Self {
            path: Some(path),
            tables: Mutex::new(tables),
        })
    }

    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            tables: Mutex::new(Tables::default()),
        }
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Run a mutation under the lock on a copy of the tables. The copy
    /// replaces the live tables only once it has been persisted.
    async fn write<T: Send>(&self, f: impl FnOnce(&mut Tables) -> Result<T> + Send) -> Result<T> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.clone();
        let value = f(&mut next)?;
        if let Some(path) = &self.path {
            let bytes = serde_json::to_vec_pretty(&next)?;
            Self::write_bytes(path, &bytes).await?;
        }
        *tables = next;
        Ok(value)
    }

    async fn read<T: Send>(&self, f: impl FnOnce(&Tables) -> T + Send) -> T {
        let tables = self.tables.lock().await;
        f(&tables)
    }
}

#[async_trait]
impl Store for LocalStore {
    async fn ensure_user(&self, user_id: UserId) -> Result<User> {
        if let Some(user) = self.get_user(user_id).await? {
            return Ok(user);
        }
        self.write(|t| {
            let user = t
                .users
                .entry(user_id)
                .or_insert_with(|| User::new(user_id));
            Ok(user.clone())
        })
        .await
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        Ok(self.read(|t| t.users.get(&user_id).cloned()).await)
    }

    async fn set_subscription(
        &self,
        user_id: UserId,
        tier: SubscriptionTier,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<User> {
        self.write(|t| {
            let user = t
                .users
                .get_mut(&user_id)
                .ok_or_else(|| AppError::not_found("user", user_id))?;
            user.tier = tier;
            user.expiry = expiry;
            Ok(user.clone())
        })
        .await
    }

    async fn count_searches(&self, user_id: UserId) -> Result<usize> {
        Ok(self
            .read(|t| t.searches.values().filter(|s| s.user_id == user_id).count())
            .await)
    }

    async fn create_search(&self, user_id: UserId, descriptor: SearchDescriptor) -> Result<Search> {
        self.write(|t| {
            if !t.users.contains_key(&user_id) {
                return Err(AppError::not_found("user", user_id));
            }
            t.next_search_id += 1;
            let search = Search {
                id: t.next_search_id,
                user_id,
                descriptor,
                last_checked: Some(Utc::now()),
            };
            t.searches.insert(search.id, search.clone());
            Ok(search)
        })
        .await
    }

    async fn get_search(&self, search_id: SearchId) -> Result<Option<Search>> {
        Ok(self.read(|t| t.searches.get(&search_id).cloned()).await)
    }

    async fn list_searches(&self) -> Result<Vec<Search>> {
        Ok(self.read(|t| t.searches.values().cloned().collect()).await)
    }

    async fn searches_for_user(&self, user_id: UserId) -> Result<Vec<Search>> {
        Ok(self
            .read(|t| {
                t.searches
                    .values()
                    .filter(|s| s.user_id == user_id)
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn delete_search(&self, search_id: SearchId) -> Result<bool> {
        if self.get_search(search_id).await?.is_none() {
            return Ok(false);
        }
        self.write(|t| {
            t.ads.remove(&search_id);
            Ok(t.searches.remove(&search_id).is_some())
        })
        .await
    }

    async fn touch_search(&self, search_id: SearchId, at: DateTime<Utc>) -> Result<bool> {
        self.write(|t| {
            Ok(match t.searches.get_mut(&search_id) {
                Some(search) => {
                    search.last_checked = Some(at);
                    true
                }
                None => false,
            })
        })
        .await
    }

    async fn stored_ad_ids(&self, search_id: SearchId) -> Result<HashSet<String>> {
        Ok(self
            .read(|t| {
                t.ads
                    .get(&search_id)
                    .map(|ads| ads.keys().cloned().collect())
                    .unwrap_or_default()
            })
            .await)
    }

    async fn upsert_ads(&self, search_id: SearchId, ads: &[Ad]) -> Result<()> {
        self.write(|t| {
            if !t.searches.contains_key(&search_id) {
                return Err(AppError::not_found("search", search_id));
            }
            let rows = t.ads.entry(search_id).or_default();
            for ad in ads {
                let mut row = ad.clone();
                row.search_id = search_id;
                rows.insert(row.id.clone(), row);
            }
            Ok(())
        })
        .await
    }

    async fn ads_for_search(&self, search_id: SearchId) -> Result<Vec<Ad>> {
        Ok(self
            .read(|t| {
                t.ads
                    .get(&search_id)
                    .map(|ads| ads.values().cloned().collect())
                    .unwrap_or_default()
            })
            .await)
    }

    async fn load_wizard(&self, user_id: UserId) -> Result<Option<WizardState>> {
        Ok(self.read(|t| t.wizards.get(&user_id).cloned()).await)
    }

    async fn save_wizard(&self, user_id: UserId, state: &WizardState) -> Result<()> {
        let state = state.clone();
        self.write(|t| {
            t.wizards.insert(user_id, state);
            Ok(())
        })
        .await
    }

    async fn clear_wizard(&self, user_id: UserId) -> Result<()> {
        if self.load_wizard(user_id).await?.is_none() {
            return Ok(());
        }
        self.write(|t| {
            t.wizards.remove(&user_id);
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::models::Range;

    fn ad(id: &str, title: &str) -> Ad {
        Ad {
            id: id.into(),
            search_id: 0,
            title: title.into(),
            price: "1 000 €".into(),
            url: format!("https://example.com/{id}"),
            date_posted: "12.03.2024".into(),
            is_new: true,
        }
    }

    #[tokio::test]
    async fn test_ensure_user_is_idempotent() {
        let store = LocalStore::in_memory();
        let first = store.ensure_user(7).await.unwrap();
        assert_eq!(first.tier, SubscriptionTier::Free);

        store
            .set_subscription(7, SubscriptionTier::Vip, None)
            .await
            .unwrap();
        let again = store.ensure_user(7).await.unwrap();
        assert_eq!(again.tier, SubscriptionTier::Vip);
    }

    #[tokio::test]
    async fn test_search_ids_are_generated() {
        let store = LocalStore::in_memory();
        store.ensure_user(1).await.unwrap();
        let a = store
            .create_search(1, SearchDescriptor::new("cars", "Audi", "A4"))
            .await
            .unwrap();
        let b = store
            .create_search(1, SearchDescriptor::new("cars", "BMW", "X5"))
            .await
            .unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.count_searches(1).await.unwrap(), 2);
        assert_eq!(store.count_searches(2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_search_requires_user() {
        let store = LocalStore::in_memory();
        let err = store
            .create_search(99, SearchDescriptor::new("cars", "Audi", "A4"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = LocalStore::in_memory();
        store.ensure_user(1).await.unwrap();
        let search = store
            .create_search(1, SearchDescriptor::new("cars", "Audi", "A4"))
            .await
            .unwrap();

        store
            .upsert_ads(search.id, &[ad("111", "Old title")])
            .await
            .unwrap();
        let mut updated = ad("111", "New title");
        updated.is_new = false;
        store.upsert_ads(search.id, &[updated]).await.unwrap();

        let rows = store.ads_for_search(search.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "New title");
        assert!(!rows[0].is_new);
        assert_eq!(rows[0].search_id, search.id);
    }

    #[tokio::test]
    async fn test_same_ad_id_in_two_searches() {
        let store = LocalStore::in_memory();
        store.ensure_user(1).await.unwrap();
        let a = store
            .create_search(1, SearchDescriptor::new("cars", "Audi", "A4"))
            .await
            .unwrap();
        let b = store
            .create_search(1, SearchDescriptor::new("cars", "Audi", "A6"))
            .await
            .unwrap();

        store.upsert_ads(a.id, &[ad("111", "x")]).await.unwrap();
        store.upsert_ads(b.id, &[ad("111", "x")]).await.unwrap();

        assert!(store.stored_ad_ids(a.id).await.unwrap().contains("111"));
        assert!(store.stored_ad_ids(b.id).await.unwrap().contains("111"));
    }

    #[tokio::test]
    async fn test_delete_cascades_ads() {
        let store = LocalStore::in_memory();
        store.ensure_user(1).await.unwrap();
        let search = store
            .create_search(1, SearchDescriptor::new("cars", "Audi", "A4"))
            .await
            .unwrap();
        store.upsert_ads(search.id, &[ad("1", "x")]).await.unwrap();

        assert!(store.delete_search(search.id).await.unwrap());
        assert!(!store.delete_search(search.id).await.unwrap());
        assert!(store.ads_for_search(search.id).await.unwrap().is_empty());
        assert!(!store.touch_search(search.id, Utc::now()).await.unwrap());
        assert!(
            store
                .upsert_ads(search.id, &[ad("2", "y")])
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db/tracker.json");

        let search_id = {
            let store = LocalStore::open(&path).await.unwrap();
            store.ensure_user(5).await.unwrap();
            let search = store
                .create_search(
                    5,
                    SearchDescriptor::new("cars", "BMW", "X5")
                        .with_year(Range::new(Some(2010), Some(2020))),
                )
                .await
                .unwrap();
            store.upsert_ads(search.id, &[ad("9", "x")]).await.unwrap();
            store
                .save_wizard(5, &WizardState::AwaitingModel { make: "Audi".into() })
                .await
                .unwrap();
            search.id
        };

        let store = LocalStore::open(&path).await.unwrap();
        let search = store.get_search(search_id).await.unwrap().unwrap();
        assert_eq!(search.descriptor.year.to, Some(2020));
        assert_eq!(store.stored_ad_ids(search_id).await.unwrap().len(), 1);
        assert_eq!(
            store.load_wizard(5).await.unwrap(),
            Some(WizardState::AwaitingModel { make: "Audi".into() })
        );

        // Generated ids keep increasing after reopen.
        let next = store
            .create_search(5, SearchDescriptor::new("cars", "Audi", "A4"))
            .await
            .unwrap();
        assert!(next.id > search_id);
    }

    #[tokio::test]
    async fn test_wizard_clear() {
        let store = LocalStore::in_memory();
        store.save_wizard(1, &WizardState::AwaitingMake).await.unwrap();
        store.clear_wizard(1).await.unwrap();
        assert_eq!(store.load_wizard(1).await.unwrap(), None);
        store.clear_wizard(1).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_memory_unchanged() {
        let dir = tempdir().unwrap();
        let parent = dir.path().join("data");
        let store = LocalStore::open(parent.join("db.json")).await.unwrap();
        store.ensure_user(1).await.unwrap();

        // Replace the data directory with a plain file so writes fail.
        std::fs::remove_dir_all(&parent).unwrap();
        std::fs::write(&parent, b"not a directory").unwrap();

        assert!(store.ensure_user(2).await.is_err());
        assert_eq!(store.get_user(2).await.unwrap(), None);

        let descriptor = SearchDescriptor::new("cars", "Audi", "A4");
        assert!(store.create_search(1, descriptor).await.is_err());
        assert_eq!(store.count_searches(1).await.unwrap(), 0);
        assert!(store.get_user(1).await.unwrap().is_some());
    }
}

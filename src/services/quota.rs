//! Subscription tiers and search quotas.
//!
//! Quota is checked when a search is created and never again: a later
//! change of tier does not revisit existing searches. Subscription expiry is
//! recorded on upgrade but not enforced.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::error::{AppError, Result};
use crate::models::{Search, SearchDescriptor, SubscriptionTier, User, UserId};
use crate::storage::Store;

/// Outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed,
    Exceeded {
        tier: SubscriptionTier,
        limit: usize,
        current: usize,
    },
}

/// Outcome of a search-creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCreation {
    Created(Search),
    QuotaExceeded {
        tier: SubscriptionTier,
        limit: usize,
        current: usize,
    },
}

/// Confirms payment for a tier upgrade.
#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    async fn verify(&self, user_id: UserId, tier: SubscriptionTier) -> Result<bool>;
}

/// Payment stub that approves every upgrade.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproveAll;

#[async_trait]
impl PaymentVerifier for ApproveAll {
    async fn verify(&self, _user_id: UserId, _tier: SubscriptionTier) -> Result<bool> {
        Ok(true)
    }
}

/// Enforces per-tier search limits and performs upgrades.
pub struct QuotaService {
    store: Arc<dyn Store>,
    payments: Arc<dyn PaymentVerifier>,
    period: Duration,
}

impl QuotaService {
    pub fn new(store: Arc<dyn Store>, payments: Arc<dyn PaymentVerifier>, period_days: i64) -> Self {
        Self {
            store,
            payments,
            period: Duration::days(period_days),
        }
    }

    /// Whether the user may register one more search right now.
    pub async fn check(&self, user_id: UserId) -> Result<QuotaDecision> {
        let user = self.store.ensure_user(user_id).await?;
        let Some(limit) = user.tier.search_limit() else {
            return Ok(QuotaDecision::Allowed);
        };

        let current = self.store.count_searches(user_id).await?;
        if current >= limit {
            log::info!(
                "User {} at quota: {} of {} searches on {}",
                user_id,
                current,
                limit,
                user.tier
            );
            return Ok(QuotaDecision::Exceeded {
                tier: user.tier,
                limit,
                current,
            });
        }
        Ok(QuotaDecision::Allowed)
    }

    /// Create a search if the owner's tier allows it.
    pub async fn create_search(
        &self,
        user_id: UserId,
        descriptor: SearchDescriptor,
    ) -> Result<SearchCreation> {
        match self.check(user_id).await? {
            QuotaDecision::Exceeded {
                tier,
                limit,
                current,
            } => Ok(SearchCreation::QuotaExceeded {
                tier,
                limit,
                current,
            }),
            QuotaDecision::Allowed => {
                let search = self.store.create_search(user_id, descriptor).await?;
                log::info!(
                    "User {} created search {} ({})",
                    user_id,
                    search.id,
                    search.descriptor.label()
                );
                Ok(SearchCreation::Created(search))
            }
        }
    }

    /// Move a user to a higher tier after payment is confirmed.
    pub async fn upgrade(&self, user_id: UserId, target: SubscriptionTier) -> Result<User> {
        let user = self.store.ensure_user(user_id).await?;
        if !user.tier.can_upgrade_to(target) {
            return Err(AppError::InvalidTransition {
                from: user.tier.to_string(),
                to: target.to_string(),
            });
        }

        if !self.payments.verify(user_id, target).await? {
            return Err(AppError::validation(format!(
                "payment for {target} not confirmed"
            )));
        }

        let expiry = Utc::now() + self.period;
        let user = self
            .store
            .set_subscription(user_id, target, Some(expiry))
            .await?;
        log::info!("User {} upgraded to {}", user_id, target);
        Ok(user)
    }
}

//! Users and subscription tiers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;
use crate::error::AppError;

/// Subscription level bounding the number of registered searches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Premium,
    Vip,
}

impl SubscriptionTier {
    /// Maximum number of searches, `None` meaning unbounded.
    pub fn search_limit(self) -> Option<usize> {
        match self {
            SubscriptionTier::Free => Some(1),
            SubscriptionTier::Premium => Some(3),
            SubscriptionTier::Vip => None,
        }
    }

    /// Tiers are only ever upgraded: free → premium → vip, or free → vip.
    pub fn can_upgrade_to(self, target: SubscriptionTier) -> bool {
        target > self
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Premium => "premium",
            SubscriptionTier::Vip => "vip",
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionTier {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(SubscriptionTier::Free),
            "premium" => Ok(SubscriptionTier::Premium),
            "vip" => Ok(SubscriptionTier::Vip),
            other => Err(AppError::malformed(format!("unknown tier '{other}'"))),
        }
    }
}

/// A user of the tracker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    #[serde(rename = "subscription_type")]
    pub tier: SubscriptionTier,
    #[serde(rename = "subscription_expiry")]
    pub expiry: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            tier: SubscriptionTier::Free,
            expiry: None,
        }
    }

    /// Whether the stored expiry has passed. Informational only; quota ignores it.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }
}

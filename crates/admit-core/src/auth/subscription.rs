use crate::store::{keys, KeyValueStore, StoreError};
use serde::Deserialize;
use std::{fmt, sync::Arc};
use tracing::{debug, warn};

/// A user's subscription level.
///
/// `free`, `base` and `mini` are the restricted tiers; every other level is carried
/// verbatim (lower-cased) in [`SubscriptionTier::Other`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum SubscriptionTier {
    #[default]
    Free,
    Base,
    Mini,
    Other(String),
}

impl SubscriptionTier {
    /// Parses a level string case-insensitively. Blank input maps to [`SubscriptionTier::Free`].
    #[must_use]
    pub fn from_level(level: &str) -> Self {
        let level = level.trim().to_lowercase();
        match level.as_str() {
            "" | "free" => Self::Free,
            "base" => Self::Base,
            "mini" => Self::Mini,
            _ => Self::Other(level),
        }
    }

    /// Tier name as used in rule lookups and store keys.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Free => "free",
            Self::Base => "base",
            Self::Mini => "mini",
            Self::Other(level) => level,
        }
    }

    /// Whether resource entitlement checks apply to this tier.
    #[must_use]
    pub fn is_restricted(&self) -> bool {
        matches!(self, Self::Free | Self::Base | Self::Mini)
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored subscription record: `{"ChatGPT": {"level": "Plus"}}`.
///
/// Every field is optional; anything missing falls back to the free tier.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionRecord {
    #[serde(rename = "ChatGPT", default)]
    pub plan: Option<PlanEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanEntry {
    #[serde(default)]
    pub level: Option<String>,
}

impl SubscriptionRecord {
    #[must_use]
    pub fn tier(&self) -> SubscriptionTier {
        self.plan
            .as_ref()
            .and_then(|plan| plan.level.as_deref())
            .map(SubscriptionTier::from_level)
            .unwrap_or_default()
    }
}

/// Resolves a user's current tier from the store.
#[derive(Clone)]
pub struct TierResolver {
    store: Arc<dyn KeyValueStore>,
}

impl TierResolver {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Looks up the subscription record for `user_id`.
    ///
    /// A missing, blank or undecodable record resolves to [`SubscriptionTier::Free`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store lookup itself fails.
    pub async fn resolve(&self, user_id: &str) -> Result<SubscriptionTier, StoreError> {
        let Some(raw) = self.store.get(&keys::subscription(user_id)).await? else {
            debug!(user_id, "no subscription record, defaulting to free tier");
            return Ok(SubscriptionTier::Free);
        };

        if raw.trim().is_empty() {
            return Ok(SubscriptionTier::Free);
        }

        match serde_json::from_str::<SubscriptionRecord>(&raw) {
            Ok(record) => Ok(record.tier()),
            Err(e) => {
                warn!(user_id, error = %e, "unparsable subscription record, defaulting to free tier");
                Ok(SubscriptionTier::Free)
            }
        }
    }
}

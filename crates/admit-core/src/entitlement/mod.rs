//! Resource entitlement for restricted subscription tiers.
//!
//! Users on `free`, `base` or `mini` may only use resources labelled `mini` or `free`.
//! Every other tier may use any resource. Lookups fail closed: a restricted user is denied
//! when the resource record is missing or cannot be decoded.

use crate::{
    auth::subscription::TierResolver,
    store::{keys, KeyValueStore, StoreError},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Labels restricted tiers are allowed to use.
pub const OPEN_LABELS: [&str; 2] = ["mini", "free"];

/// Stored resource record: `{"label": "mini"}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceRecord {
    #[serde(default)]
    pub label: Option<String>,
}

impl ResourceRecord {
    /// Lower-cased, trimmed label. `None` when missing or blank.
    #[must_use]
    pub fn normalized_label(&self) -> Option<String> {
        self.label
            .as_deref()
            .map(|label| label.trim().to_lowercase())
            .filter(|label| !label.is_empty())
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.normalized_label().is_some_and(|label| OPEN_LABELS.contains(&label.as_str()))
    }
}

#[derive(Clone)]
pub struct EntitlementResolver {
    store: Arc<dyn KeyValueStore>,
    tiers: TierResolver,
}

impl EntitlementResolver {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let tiers = TierResolver::new(store.clone());
        Self { store, tiers }
    }

    /// Whether `user_id` may use `resource_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the tier or resource lookup fails.
    pub async fn can_use(&self, user_id: &str, resource_id: &str) -> Result<bool, StoreError> {
        let tier = self.tiers.resolve(user_id).await?;
        if !tier.is_restricted() {
            return Ok(true);
        }

        if resource_id.is_empty() {
            debug!(user_id, %tier, "no resource id presented by restricted tier");
            return Ok(false);
        }

        let Some(raw) = self.store.get(&keys::resource(resource_id)).await? else {
            debug!(user_id, resource_id, "resource record not found");
            return Ok(false);
        };

        let record = match serde_json::from_str::<ResourceRecord>(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(resource_id, error = %e, "unparsable resource record");
                return Ok(false);
            }
        };

        let allowed = record.is_open();
        debug!(user_id, %tier, resource_id, label = ?record.label, allowed, "entitlement checked");
        Ok(allowed)
    }
}

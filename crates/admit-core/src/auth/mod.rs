//! Session validation and subscription tier resolution.
//!
//! # Session Validation
//!
//! A session is a `(user_id, token)` pair presented by the client. It is valid when the
//! token equals the credential on record for that user. The check fails closed:
//!
//! ```text
//!   (user_id, token)
//!        │
//!        ├──> empty user_id or token ──────────────> invalid (no lookup)
//!        │
//!        ├──> store.get(xtoken_{user_id})
//!        │         │
//!        │         ├── Err ──> StoreError (decision could not be made)
//!        │         ├── None ─> invalid
//!        │         └── Some(expected)
//!        │
//!        └──> token == expected ───────────────────> valid / invalid
//! ```
//!
//! Credential expiry is owned by whoever writes the record (typically a TTL on the key);
//! the validator has no notion of time.
//!
//! # Tier Resolution
//!
//! [`subscription::TierResolver`] reads the user's subscription record and decodes it into
//! a [`SubscriptionTier`]. Both the quota tracker and the entitlement resolver use it. An
//! absent or undecodable record is the free tier; a failed lookup is a [`StoreError`].

pub mod subscription;

pub use subscription::{SubscriptionRecord, SubscriptionTier, TierResolver};

use crate::store::{keys, KeyValueStore, StoreError};
use std::sync::Arc;
use tracing::debug;

/// Confirms a presented token matches the credential on record.
#[derive(Clone)]
pub struct SessionValidator {
    store: Arc<dyn KeyValueStore>,
}

impl SessionValidator {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Returns whether `presented_token` is the current credential for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only when the lookup itself fails. A missing credential is
    /// reported as `Ok(false)`.
    pub async fn verify(&self, user_id: &str, presented_token: &str) -> Result<bool, StoreError> {
        if user_id.is_empty() || presented_token.is_empty() {
            debug!("session rejected: missing user id or token");
            return Ok(false);
        }

        let Some(expected) = self.store.get(&keys::credential(user_id)).await? else {
            debug!(user_id, "session rejected: no credential on record");
            return Ok(false);
        };

        Ok(presented_token == expected)
    }
}

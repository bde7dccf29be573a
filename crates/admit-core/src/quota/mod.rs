//! Fixed-window quotas per user, tier and model.
//!
//! Each `(user, tier, model)` triple owns one counter in the store. The first increment
//! after a reset arms the counter's expiry to the rule's window; when the key expires the
//! window starts over.
//!
//! # Plan Changes
//!
//! Alongside the counters, a tier marker records which tier the user's live counter was
//! armed for. When the resolved tier differs from the marker, the counter for the new tier
//! is reset before it is read, so upgrading or downgrading always starts a fresh window.
//!
//! # Races
//!
//! Two requests racing through the reset step may both reset; the reset is idempotent.
//! The compare against `max_count` and the increment run as one store operation
//! ([`KeyValueStore::incr_below`]), so concurrent requests never lose an increment and
//! never push a counter past its maximum.

pub mod rule;
pub mod rules;

pub use rule::{RateLimitRule, RuleError};
pub use rules::{RateLimitRuleSet, RuleSetError};

use crate::{
    auth::subscription::{SubscriptionTier, TierResolver},
    store::{keys, KeyValueStore, StoreError},
};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const ALLOWED_MESSAGE: &str = "allowed";
pub const NO_RULE_MESSAGE: &str = "no rate limit configured";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuotaError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("rule '{rule}' for tier '{tier}' is invalid: {source}")]
    Config {
        tier: String,
        rule: String,
        #[source]
        source: RuleError,
    },
}

/// Outcome of a quota check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed,
    Denied { message: String },
}

impl QuotaDecision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Allowed => ALLOWED_MESSAGE,
            Self::Denied { message } => message,
        }
    }
}

/// Read-only view of one user's quota state, for operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaSnapshot {
    pub tier: SubscriptionTier,
    pub marker: Option<String>,
    pub rule: Option<RateLimitRule>,
    pub count: u64,
    pub ttl: Option<Duration>,
}

pub struct QuotaTracker {
    store: Arc<dyn KeyValueStore>,
    rules: Arc<RateLimitRuleSet>,
    tiers: TierResolver,
}

impl QuotaTracker {
    pub fn new(store: Arc<dyn KeyValueStore>, rules: Arc<RateLimitRuleSet>) -> Self {
        let tiers = TierResolver::new(store.clone());
        Self { store, rules, tiers }
    }

    /// Charges one unit of quota for `model` to `user_id` if the window has room.
    ///
    /// A deny is a normal outcome, not an error. Failing to arm the window's expiry after a
    /// successful increment is logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaError::Store`] if the tier lookup or a counter or marker write fails,
    /// or the counter holds a non-integer, and [`QuotaError::Config`] if the applicable rule cannot be parsed.
    pub async fn check_and_consume(
        &self,
        user_id: &str,
        model: &str,
    ) -> Result<QuotaDecision, QuotaError> {
        let tier = self.tiers.resolve(user_id).await?;

        let Some(rule) = self.rule_for(&tier, model)? else {
            debug!(user_id, %tier, model, "no rate limit rule applies");
            return Ok(QuotaDecision::Denied { message: NO_RULE_MESSAGE.to_string() });
        };

        let counter_key = keys::quota_counter(user_id, tier.as_str(), model);
        self.reset_on_plan_change(user_id, &tier, &counter_key, rule.window).await?;

        let Some(count) = self.store.incr_below(&counter_key, rule.max_count).await? else {
            info!(user_id, %tier, model, max = rule.max_count, "quota exhausted");
            return Ok(QuotaDecision::Denied { message: denial_message(&tier, model, &rule) });
        };

        if count == 1 {
            match self.store.expire(&counter_key, rule.window).await {
                Ok(true) => {}
                Ok(false) => warn!(key = %counter_key, "quota counter vanished before expiry was armed"),
                Err(e) => warn!(key = %counter_key, error = %e, "failed to arm quota window"),
            }
        }

        debug!(user_id, %tier, model, count, max = rule.max_count, "quota consumed");
        Ok(QuotaDecision::Allowed)
    }

    /// Current quota state for `(user_id, model)` without consuming anything.
    ///
    /// # Errors
    ///
    /// Same as [`QuotaTracker::check_and_consume`].
    pub async fn inspect(&self, user_id: &str, model: &str) -> Result<QuotaSnapshot, QuotaError> {
        let tier = self.tiers.resolve(user_id).await?;
        let rule = self.rule_for(&tier, model)?;
        let counter_key = keys::quota_counter(user_id, tier.as_str(), model);

        let marker = self.store.get(&keys::tier_marker(user_id)).await?;
        let count = self.read_count(&counter_key).await?;
        let ttl = self.store.ttl(&counter_key).await?;

        Ok(QuotaSnapshot { tier, marker, rule, count, ttl })
    }

    /// Clears the user's counter for `model` under their current tier and the tier marker,
    /// so the next request starts a fresh window. Returns whether a counter was removed.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaError::Store`] if the store is unavailable.
    pub async fn reset(&self, user_id: &str, model: &str) -> Result<bool, QuotaError> {
        let tier = self.tiers.resolve(user_id).await?;
        let removed = self.store.delete(&keys::quota_counter(user_id, tier.as_str(), model)).await?;
        self.store.delete(&keys::tier_marker(user_id)).await?;

        info!(user_id, %tier, model, removed, "quota reset");
        Ok(removed)
    }

    fn rule_for(
        &self,
        tier: &SubscriptionTier,
        model: &str,
    ) -> Result<Option<RateLimitRule>, QuotaError> {
        self.rules
            .resolve(tier.as_str(), model)
            .map(|raw| {
                RateLimitRule::parse(raw).map_err(|source| QuotaError::Config {
                    tier: tier.to_string(),
                    rule: raw.to_string(),
                    source,
                })
            })
            .transpose()
    }

    async fn reset_on_plan_change(
        &self,
        user_id: &str,
        tier: &SubscriptionTier,
        counter_key: &str,
        window: Duration,
    ) -> Result<(), StoreError> {
        let marker_key = keys::tier_marker(user_id);
        let marker = match self.store.get(&marker_key).await {
            Ok(marker) => marker,
            Err(e) => {
                warn!(user_id, error = %e, "failed to read tier marker, treating as plan change");
                None
            }
        };

        if marker.as_deref() == Some(tier.as_str()) {
            return Ok(());
        }

        info!(user_id, previous = ?marker, %tier, "plan change detected, resetting quota window");
        self.store.set(counter_key, "0", Some(window)).await?;
        self.store.set(&marker_key, tier.as_str(), None).await
    }

    async fn read_count(&self, counter_key: &str) -> Result<u64, StoreError> {
        match self.store.get(counter_key).await? {
            None => Ok(0),
            Some(raw) => raw.trim().parse().map_err(|_| StoreError::Malformed {
                key: counter_key.to_string(),
                reason: format!("quota counter is not a non-negative integer: '{raw}'"),
            }),
        }
    }
}

fn denial_message(tier: &SubscriptionTier, model: &str, rule: &RateLimitRule) -> String {
    format!(
        "rate limit exceeded: the {tier} plan allows {} requests to {model} every {} minutes, \
         please try again later or upgrade your plan",
        rule.max_count,
        rule.window_minutes()
    )
}

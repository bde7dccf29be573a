use super::rule::{RateLimitRule, RuleError};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};
use thiserror::Error;
use tracing::info;

/// Key used both as the per-tier model fallback and the global fallback.
pub const FALLBACK_KEY: &str = "other";

#[derive(Error, Debug)]
pub enum RuleSetError {
    #[error("failed to read rule file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rule document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid rule for tier '{tier}', model '{model}': {source}")]
    InvalidRule {
        tier: String,
        model: String,
        #[source]
        source: RuleError,
    },
}

/// Rule document mapping tier → model → rule string, with fallbacks.
///
/// ```json
/// {
///   "chatgpt": {
///     "free": { "gpt-4": "5/1h", "other": "20/1d" },
///     "plus": { "other": "100/3h" }
///   },
///   "other": "10/1d"
/// }
/// ```
///
/// Tier keys are lower-cased on load to match resolved tiers. Empty rule strings are
/// treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRuleSet {
    #[serde(rename = "chatgpt", alias = "tiers", default)]
    tiers: BTreeMap<String, BTreeMap<String, String>>,

    #[serde(rename = "other", default, skip_serializing_if = "Option::is_none")]
    fallback: Option<String>,
}

impl RateLimitRuleSet {
    #[must_use]
    pub fn new(
        tiers: BTreeMap<String, BTreeMap<String, String>>,
        fallback: Option<String>,
    ) -> Self {
        Self { tiers, fallback }.normalized()
    }

    /// Parses and validates a rule document.
    ///
    /// # Errors
    ///
    /// Returns [`RuleSetError`] on malformed JSON or any rule string that fails to parse.
    pub fn from_json(json: &str) -> Result<Self, RuleSetError> {
        let rules = serde_json::from_str::<Self>(json)?.normalized();
        rules.validate()?;
        Ok(rules)
    }

    /// Loads and validates a rule document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`RuleSetError`] if the file cannot be read or the document is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RuleSetError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|source| RuleSetError::Io { path: path.display().to_string(), source })?;
        let rules = Self::from_json(&json)?;

        info!(
            path = %path.display(),
            tiers = rules.tiers.len(),
            rules = rules.len(),
            "loaded rate limit rules"
        );
        Ok(rules)
    }

    fn normalized(self) -> Self {
        let mut tiers: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for (tier, models) in self.tiers {
            tiers.entry(tier.trim().to_lowercase()).or_default().extend(models);
        }
        Self { tiers, fallback: self.fallback }
    }

    /// Parses every non-empty rule string in the document.
    ///
    /// # Errors
    ///
    /// Returns the first [`RuleSetError::InvalidRule`] found.
    pub fn validate(&self) -> Result<(), RuleSetError> {
        for (tier, model, rule) in self.entries() {
            RateLimitRule::parse(rule).map_err(|source| RuleSetError::InvalidRule {
                tier: tier.to_string(),
                model: model.to_string(),
                source,
            })?;
        }
        Ok(())
    }

    /// Rule string for `(tier, model)`: exact model, then the tier's `other`, then the
    /// global `other`. `None` means no quota applies.
    #[must_use]
    pub fn resolve(&self, tier: &str, model: &str) -> Option<&str> {
        let models = self.tiers.get(tier);
        models
            .and_then(|m| non_empty(m.get(model)))
            .or_else(|| models.and_then(|m| non_empty(m.get(FALLBACK_KEY))))
            .or_else(|| non_empty(self.fallback.as_ref()))
    }

    /// Every non-empty rule as `(tier, model, rule)`. The global fallback is reported with
    /// tier and model both set to `other`.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.tiers
            .iter()
            .flat_map(|(tier, models)| {
                models.iter().filter_map(move |(model, rule)| {
                    non_empty(Some(rule)).map(|rule| (tier.as_str(), model.as_str(), rule))
                })
            })
            .chain(non_empty(self.fallback.as_ref()).map(|rule| (FALLBACK_KEY, FALLBACK_KEY, rule)))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tier_names(&self) -> impl Iterator<Item = &str> {
        self.tiers.keys().map(String::as_str)
    }
}

fn non_empty(rule: Option<&String>) -> Option<&str> {
    rule.map(|r| r.trim()).filter(|r| !r.is_empty())
}

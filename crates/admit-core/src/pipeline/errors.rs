use crate::{
    quota::{QuotaError, RuleError},
    store::StoreError,
};

/// Failure to reach an admission decision. Maps to an internal error, never an allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("{stage} failed: {source}")]
    Store {
        stage: Stage,
        #[source]
        source: StoreError,
    },

    #[error("rate limit rule '{rule}' for tier '{tier}' is invalid: {source}")]
    Config {
        tier: String,
        rule: String,
        #[source]
        source: RuleError,
    },
}

impl AdmissionError {
    pub(super) fn store(stage: Stage, source: StoreError) -> Self {
        Self::Store { stage, source }
    }

    pub(super) fn quota(err: QuotaError) -> Self {
        match err {
            QuotaError::Store(source) => Self::store(Stage::Quota, source),
            QuotaError::Config { tier, rule, source } => Self::Config { tier, rule, source },
        }
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Store { stage, .. } => *stage,
            Self::Config { .. } => Stage::Quota,
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Store { source: StoreError::Timeout, .. })
    }
}

/// Pipeline stage that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Session,
    Quota,
    Entitlement,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Session => "session validation",
            Self::Quota => "rate limit check",
            Self::Entitlement => "entitlement check",
        })
    }
}

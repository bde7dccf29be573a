use std::{fmt, str::FromStr, time::Duration};
use thiserror::Error;

/// Longest accepted window: ten years.
pub const MAX_WINDOW: Duration = Duration::from_secs(10 * 365 * 86_400);

/// Errors from parsing a `"<count>/<duration>"` rule string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("invalid rule format '{0}', expected '<count>/<duration>'")]
    InvalidFormat(String),

    #[error("invalid count in rule '{0}'")]
    InvalidCount(String),

    #[error("invalid duration in rule '{0}'")]
    InvalidDuration(String),

    #[error("rule '{0}' has a non-positive window")]
    NonPositiveWindow(String),
}

/// A fixed-window quota: at most `max_count` requests per `window`.
///
/// Grammar: `<count>/<value>[h|d|m]`, where a missing unit means seconds.
///
/// ```
/// use admit_core::quota::RateLimitRule;
/// use std::time::Duration;
///
/// let rule: RateLimitRule = "10/30m".parse().unwrap();
/// assert_eq!(rule.max_count, 10);
/// assert_eq!(rule.window, Duration::from_secs(1800));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub max_count: u64,
    pub window: Duration,
}

impl RateLimitRule {
    /// # Errors
    ///
    /// Returns [`RuleError`] if the count is not a non-negative integer, the unit is not one
    /// of `h`, `d`, `m`, or the window is not positive or longer than [`MAX_WINDOW`].
    pub fn parse(rule: &str) -> Result<Self, RuleError> {
        let (count, duration) =
            rule.split_once('/').ok_or_else(|| RuleError::InvalidFormat(rule.to_string()))?;
        if duration.contains('/') {
            return Err(RuleError::InvalidFormat(rule.to_string()));
        }

        let max_count: u64 =
            count.parse().map_err(|_| RuleError::InvalidCount(rule.to_string()))?;

        let (value, unit_seconds) = if let Some(v) = duration.strip_suffix('h') {
            (v, 3600)
        } else if let Some(v) = duration.strip_suffix('d') {
            (v, 86_400)
        } else if let Some(v) = duration.strip_suffix('m') {
            (v, 60)
        } else {
            (duration, 1)
        };

        let value: i64 = value.parse().map_err(|_| RuleError::InvalidDuration(rule.to_string()))?;
        if value <= 0 {
            return Err(RuleError::NonPositiveWindow(rule.to_string()));
        }

        let seconds = u64::try_from(value)
            .ok()
            .and_then(|v| v.checked_mul(unit_seconds))
            .filter(|&seconds| seconds <= MAX_WINDOW.as_secs())
            .ok_or_else(|| RuleError::InvalidDuration(rule.to_string()))?;

        Ok(Self { max_count, window: Duration::from_secs(seconds) })
    }

    /// Window length in whole minutes, as shown in denial messages.
    #[must_use]
    pub fn window_minutes(&self) -> u64 {
        self.window.as_secs() / 60
    }
}

impl FromStr for RateLimitRule {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RateLimitRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.max_count, self.window.as_secs())
    }
}

//! Retry policy types
//!
//! [`RetryPolicy`] is the validated, immutable form the executor consumes.
//! [`RetrySettings`] is its configuration-file mirror: it keeps signed fields
//! so that a negative value written in YAML is rejected by policy validation
//! with a useful message instead of surfacing as a parse error.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default number of retries after the initial attempt
pub const DEFAULT_MAX_RETRY_COUNT: u32 = 6;

/// Default upper bound for a single backoff delay
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Default backoff coefficient (the delay unit multiplied by `2^n - 1`)
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default jitter factor; delays are scaled by a random value in `[1.0, 1.0 + factor)`
pub const DEFAULT_JITTER_FACTOR: f64 = 0.1;

/// Validated retry policy
///
/// All parameters are fixed at construction. A policy is cheap to clone and
/// safe to share between any number of concurrent executions.
///
/// # Example
///
/// ```rust
/// use recur_core::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(3, 5000).unwrap();
/// assert_eq!(policy.max_retry_count(), 3);
/// assert_eq!(policy.max_retry_delay(), Duration::from_millis(5000));
///
/// assert!(RetryPolicy::new(-1, 5000).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retry_count: u32,
    max_retry_delay: Duration,
    base_delay: Duration,
    jitter_factor: f64,
}

impl RetryPolicy {
    /// Create a policy from a retry count and a maximum delay in milliseconds
    ///
    /// Fails with [`Error::InvalidPolicy`] if either value is negative.
    pub fn new(max_retry_count: i64, max_retry_delay_ms: i64) -> Result<Self> {
        let max_retry_count = u32::try_from(max_retry_count).map_err(|_| {
            Error::invalid_policy(
                "max-retry-count",
                format!(
                    "must be between 0 and {} (got {})",
                    u32::MAX,
                    max_retry_count
                ),
            )
        })?;

        Ok(Self {
            max_retry_count,
            max_retry_delay: non_negative_millis("max-retry-delay-ms", max_retry_delay_ms)?,
            base_delay: DEFAULT_BASE_DELAY,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        })
    }

    /// Create a policy from already non-negative values
    pub fn from_parts(max_retry_count: u32, max_retry_delay: Duration) -> Self {
        Self {
            max_retry_count,
            max_retry_delay,
            base_delay: DEFAULT_BASE_DELAY,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }

    /// Replace the backoff coefficient
    pub fn with_base_delay_ms(mut self, base_delay_ms: i64) -> Result<Self> {
        self.base_delay = non_negative_millis("base-delay-ms", base_delay_ms)?;
        Ok(self)
    }

    /// Replace the jitter factor
    pub fn with_jitter_factor(mut self, jitter_factor: f64) -> Result<Self> {
        if !jitter_factor.is_finite() || jitter_factor < 0.0 {
            return Err(Error::invalid_policy(
                "jitter-factor",
                format!("must be a finite, non-negative number (got {})", jitter_factor),
            ));
        }
        self.jitter_factor = jitter_factor;
        Ok(self)
    }

    /// Number of retries allowed after the initial attempt
    pub fn max_retry_count(&self) -> u32 {
        self.max_retry_count
    }

    /// Upper bound for any single delay
    pub fn max_retry_delay(&self) -> Duration {
        self.max_retry_delay
    }

    /// Backoff coefficient
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Jitter factor applied on top of the exponential delay
    pub fn jitter_factor(&self) -> f64 {
        self.jitter_factor
    }

    /// Total number of invocations a permanently failing operation receives
    pub fn max_attempts(&self) -> u32 {
        self.max_retry_count.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_parts(DEFAULT_MAX_RETRY_COUNT, DEFAULT_MAX_RETRY_DELAY)
    }
}

fn non_negative_millis(field: &str, millis: i64) -> Result<Duration> {
    u64::try_from(millis)
        .map(Duration::from_millis)
        .map_err(|_| {
            Error::invalid_policy(field, format!("must not be negative (got {})", millis))
        })
}

/// Retry policy as written in a configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetrySettings {
    /// Maximum number of retries after the initial attempt
    #[serde(default = "default_max_retry_count")]
    pub max_retry_count: i64,

    /// Maximum delay between attempts in milliseconds
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_ms: i64,

    /// Backoff coefficient in milliseconds
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: i64,

    /// Jitter factor
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

impl RetrySettings {
    /// Validate these settings into a policy
    pub fn to_policy(&self) -> Result<RetryPolicy> {
        RetryPolicy::new(self.max_retry_count, self.max_retry_delay_ms)?
            .with_base_delay_ms(self.base_delay_ms)?
            .with_jitter_factor(self.jitter_factor)
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retry_count: default_max_retry_count(),
            max_retry_delay_ms: default_max_retry_delay(),
            base_delay_ms: default_base_delay(),
            jitter_factor: default_jitter_factor(),
        }
    }
}

impl From<&RetryPolicy> for RetrySettings {
    fn from(policy: &RetryPolicy) -> Self {
        Self {
            max_retry_count: i64::from(policy.max_retry_count),
            max_retry_delay_ms: duration_to_millis(policy.max_retry_delay),
            base_delay_ms: duration_to_millis(policy.base_delay),
            jitter_factor: policy.jitter_factor,
        }
    }
}

fn duration_to_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

fn default_max_retry_count() -> i64 {
    i64::from(DEFAULT_MAX_RETRY_COUNT)
}
fn default_max_retry_delay() -> i64 {
    duration_to_millis(DEFAULT_MAX_RETRY_DELAY)
}
fn default_base_delay() -> i64 {
    duration_to_millis(DEFAULT_BASE_DELAY)
}
fn default_jitter_factor() -> f64 {
    DEFAULT_JITTER_FACTOR
}

/// Retry policies: one default plus named per-operation overrides
///
/// Fields missing from an operation entry take the built-in defaults, not the
/// values of the `default` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPoliciesConfig {
    /// Policy used when no operation-specific entry matches
    #[serde(default)]
    pub default: RetrySettings,

    /// Per-operation retry policies
    #[serde(default)]
    pub operations: BTreeMap<String, RetrySettings>,
}

impl RetryPoliciesConfig {
    /// The validated default policy
    pub fn default_policy(&self) -> Result<RetryPolicy> {
        self.default.to_policy()
    }

    /// The validated policy for `operation`, falling back to the default
    pub fn policy_for(&self, operation: &str) -> Result<RetryPolicy> {
        match self.operations.get(operation) {
            Some(settings) => settings.to_policy(),
            None => self.default_policy(),
        }
    }

    /// Validate every policy, reporting the first offending entry
    pub fn validate(&self) -> Result<()> {
        self.default
            .to_policy()
            .map_err(|e| Error::invalid_config(format!("retry.default: {}", e)))?;

        for (name, settings) in &self.operations {
            settings
                .to_policy()
                .map_err(|e| Error::invalid_config(format!("retry.operations.{}: {}", name, e)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retry_count(), 6);
        assert_eq!(policy.max_retry_delay(), Duration::from_secs(30));
        assert_eq!(policy.base_delay(), Duration::from_secs(1));
        assert_eq!(policy.jitter_factor(), 0.1);
        assert_eq!(policy.max_attempts(), 7);
    }

    #[test]
    fn test_zero_values_are_valid() {
        let policy = RetryPolicy::new(0, 0).unwrap();
        assert_eq!(policy.max_retry_count(), 0);
        assert_eq!(policy.max_retry_delay(), Duration::ZERO);
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn test_negative_retry_count_rejected() {
        let err = RetryPolicy::new(-1, 1000).unwrap_err();
        assert!(matches!(err, Error::InvalidPolicy { ref field, .. } if field == "max-retry-count"));
    }

    #[test]
    fn test_oversized_retry_count_rejected() {
        assert!(RetryPolicy::new(i64::from(u32::MAX) + 1, 1000).is_err());
    }

    #[test]
    fn test_negative_max_delay_rejected() {
        let err = RetryPolicy::new(3, -5).unwrap_err();
        assert!(matches!(err, Error::InvalidPolicy { ref field, .. } if field == "max-retry-delay-ms"));
        assert!(err.to_string().contains("-5"));
    }

    #[test]
    fn test_base_delay_and_jitter_validation() {
        let policy = RetryPolicy::new(3, 1000).unwrap();
        assert!(policy.clone().with_base_delay_ms(-1).is_err());
        assert!(policy.clone().with_jitter_factor(-0.5).is_err());
        assert!(policy.clone().with_jitter_factor(f64::NAN).is_err());
        assert!(policy.clone().with_jitter_factor(f64::INFINITY).is_err());

        let tuned = policy
            .with_base_delay_ms(10)
            .unwrap()
            .with_jitter_factor(0.0)
            .unwrap();
        assert_eq!(tuned.base_delay(), Duration::from_millis(10));
        assert_eq!(tuned.jitter_factor(), 0.0);
    }

    #[test]
    fn test_settings_roundtrip_through_policy() {
        let policy = RetryPolicy::new(4, 2500)
            .unwrap()
            .with_base_delay_ms(200)
            .unwrap();
        let settings = RetrySettings::from(&policy);
        assert_eq!(settings.max_retry_count, 4);
        assert_eq!(settings.max_retry_delay_ms, 2500);
        assert_eq!(settings.to_policy().unwrap(), policy);
    }

    #[test]
    fn test_settings_partial_yaml_uses_defaults() {
        let settings: RetrySettings = serde_yaml_ng::from_str("max-retry-count: 2\n").unwrap();
        assert_eq!(settings.max_retry_count, 2);
        assert_eq!(settings.max_retry_delay_ms, 30_000);
        assert_eq!(settings.base_delay_ms, 1_000);
    }

    #[test]
    fn test_policies_config_lookup() {
        let mut config = RetryPoliciesConfig::default();
        config.operations.insert(
            "deploy".to_string(),
            RetrySettings {
                max_retry_count: 2,
                ..RetrySettings::default()
            },
        );

        assert_eq!(config.policy_for("deploy").unwrap().max_retry_count(), 2);
        assert_eq!(config.policy_for("unknown").unwrap().max_retry_count(), 6);
    }

    #[test]
    fn test_policies_config_validate_names_entry() {
        let mut config = RetryPoliciesConfig::default();
        config.operations.insert(
            "broken".to_string(),
            RetrySettings {
                max_retry_delay_ms: -10,
                ..RetrySettings::default()
            },
        );

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("retry.operations.broken"));
    }
}

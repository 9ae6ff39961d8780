//! Command implementations

pub mod config;
pub mod delays;
pub mod run;

use anyhow::{anyhow, Result};
use recur_core::{RecurConfig, RetryPolicy};

use crate::cli::PolicyArgs;

/// Resolve the effective policy from configuration and command-line overrides
///
/// A named policy must exist in the configuration. Overrides are validated
/// along with the rest of the policy, so negative values are rejected here.
pub fn resolve_policy(config: &RecurConfig, args: &PolicyArgs) -> Result<RetryPolicy> {
    let mut settings = match &args.policy {
        Some(name) => config
            .retry
            .operations
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("Unknown retry policy: {}", name))?,
        None => config.retry.default.clone(),
    };

    if let Some(count) = args.max_retries {
        settings.max_retry_count = count;
    }
    if let Some(delay) = args.max_delay_ms {
        settings.max_retry_delay_ms = delay;
    }
    if let Some(base) = args.base_delay_ms {
        settings.base_delay_ms = base;
    }

    Ok(settings.to_policy()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const CONFIG: &str = r#"
retry:
  default:
    max-retry-count: 2
    max-retry-delay-ms: 4000
  operations:
    migrate:
      max-retry-count: 8
      base-delay-ms: 250
"#;

    #[test]
    fn test_resolve_default_policy() {
        let config = RecurConfig::from_yaml_str(CONFIG).unwrap();
        let policy = resolve_policy(&config, &PolicyArgs::default()).unwrap();
        assert_eq!(policy.max_retry_count(), 2);
        assert_eq!(policy.max_retry_delay(), Duration::from_secs(4));
    }

    #[test]
    fn test_resolve_named_policy_with_override() {
        let config = RecurConfig::from_yaml_str(CONFIG).unwrap();
        let args = PolicyArgs {
            policy: Some("migrate".to_string()),
            max_delay_ms: Some(500),
            ..Default::default()
        };
        let policy = resolve_policy(&config, &args).unwrap();
        assert_eq!(policy.max_retry_count(), 8);
        assert_eq!(policy.base_delay(), Duration::from_millis(250));
        assert_eq!(policy.max_retry_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_resolve_unknown_policy() {
        let config = RecurConfig::default();
        let args = PolicyArgs {
            policy: Some("missing".to_string()),
            ..Default::default()
        };
        let err = resolve_policy(&config, &args).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_resolve_rejects_negative_override() {
        let args = PolicyArgs {
            max_retries: Some(-1),
            ..Default::default()
        };
        let err = resolve_policy(&RecurConfig::default(), &args).unwrap_err();
        assert!(err.to_string().contains("max-retry-count"));
    }
}

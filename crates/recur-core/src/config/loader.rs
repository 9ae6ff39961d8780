//! Configuration file loading and parsing

use crate::error::{Error, Result};
use crate::types::{RetryPoliciesConfig, RetryPolicy};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs;

/// Configuration file names to search for
pub const CONFIG_FILE_NAMES: &[&str] = &["recur.yaml", "recur.yml"];

/// Loaded and validated recur configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RecurConfig {
    /// Retry policy configurations
    #[serde(default)]
    pub retry: RetryPoliciesConfig,

    /// Path the configuration was read from, if any
    #[serde(skip)]
    pub config_path: Option<Utf8PathBuf>,
}

impl RecurConfig {
    /// Load configuration from the specified path or search for it
    ///
    /// An explicit path must exist. Without one, the current directory and its
    /// ancestors are searched and the built-in defaults are used if nothing is
    /// found.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self> {
        let found = match path {
            Some(p) => {
                let content = fs::read_to_string(p).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        Error::config_not_found(p.as_str())
                    } else {
                        Error::Io(e)
                    }
                })?;
                Some((p.to_owned(), content))
            }
            None => Self::find_config()?,
        };

        let Some((config_path, content)) = found else {
            tracing::debug!("no configuration file found, using defaults");
            return Ok(Self::default());
        };

        tracing::debug!(path = %config_path, "loading configuration");
        let mut config = Self::from_yaml_str(&content)?;
        config.config_path = Some(config_path);
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: RecurConfig = serde_yaml_ng::from_str(content)?;
        config.retry.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// The validated policy for an operation, or the default policy
    pub fn policy(&self, operation: Option<&str>) -> Result<RetryPolicy> {
        match operation {
            Some(name) => self.retry.policy_for(name),
            None => self.retry.default_policy(),
        }
    }

    /// Find configuration file in current directory or parent directories
    fn find_config() -> Result<Option<(Utf8PathBuf, String)>> {
        let cwd = std::env::current_dir().map_err(Error::Io)?;
        let cwd = Utf8PathBuf::try_from(cwd)
            .map_err(|_| Error::invalid_config("Current directory path is not valid UTF-8"))?;

        Self::find_config_from(&cwd)
    }

    fn find_config_from(start: &Utf8Path) -> Result<Option<(Utf8PathBuf, String)>> {
        for dir in start.ancestors() {
            for name in CONFIG_FILE_NAMES {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    let content = fs::read_to_string(&candidate)?;
                    return Ok(Some((candidate, content)));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn utf8(path: std::path::PathBuf) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(path).expect("path should be valid UTF-8")
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
retry:
  default:
    max-retry-count: 4
    max-retry-delay-ms: 8000
  operations:
    deploy:
      max-retry-count: 2
      base-delay-ms: 250
      jitter-factor: 0.0
"#;
        let config = RecurConfig::from_yaml_str(yaml).unwrap();

        let default = config.policy(None).unwrap();
        assert_eq!(default.max_retry_count(), 4);
        assert_eq!(default.max_retry_delay(), Duration::from_millis(8000));

        let deploy = config.policy(Some("deploy")).unwrap();
        assert_eq!(deploy.max_retry_count(), 2);
        assert_eq!(deploy.base_delay(), Duration::from_millis(250));
        assert_eq!(deploy.jitter_factor(), 0.0);
        assert_eq!(deploy.max_retry_delay(), Duration::from_secs(30));
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = RecurConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config.policy(None).unwrap(), RetryPolicy::default());
    }

    #[test]
    fn test_negative_value_fails_validation() {
        let yaml = "retry:\n  default:\n    max-retry-count: -3\n";
        let err = RecurConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }), "got: {:?}", err);
        assert!(err.to_string().contains("max-retry-count"));
    }

    #[test]
    fn test_unknown_field_type_is_parse_error() {
        let yaml = "retry:\n  default:\n    max-retry-count: lots\n";
        let err = RecurConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, Error::YamlParse(_)), "got: {:?}", err);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let path = Utf8Path::new("/tmp/nonexistent-recur-config-12345.yaml");
        let err = RecurConfig::load(Some(path)).unwrap_err();
        assert!(
            matches!(err, Error::ConfigNotFound { .. }),
            "Expected ConfigNotFound, got: {:?}",
            err
        );
    }

    #[test]
    fn test_load_explicit_path_records_source() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = utf8(temp_dir.path().join("custom.yaml"));
        std::fs::write(&config_path, "retry:\n  default:\n    max-retry-count: 1\n").unwrap();

        let config = RecurConfig::load(Some(&config_path)).unwrap();
        assert_eq!(config.config_path.as_deref(), Some(config_path.as_path()));
        assert_eq!(config.policy(None).unwrap().max_retry_count(), 1);
    }

    #[test]
    fn test_find_config_in_ancestor() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let root = utf8(temp_dir.path().to_path_buf());
        let nested = root.join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.join("recur.yml"), "retry: {}\n").unwrap();

        let (path, _) = RecurConfig::find_config_from(&nested).unwrap().unwrap();
        assert_eq!(path, root.join("recur.yml"));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = RecurConfig::from_yaml_str("retry:\n  default:\n    max-retry-count: 9\n")
            .unwrap();
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("max-retry-count: 9"));
        assert_eq!(RecurConfig::from_yaml_str(&yaml).unwrap(), config);
    }
}

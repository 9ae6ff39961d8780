//! Error types for recur-core

use thiserror::Error;

/// Result type alias using recur-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for recur
///
/// These cover construction and configuration problems. Failures raised while
/// retrying an operation are reported through [`crate::retry::RetryError`].
#[derive(Error, Debug)]
pub enum Error {
    /// A retry policy parameter is out of range
    #[error("Invalid retry policy: {field} {message}")]
    InvalidPolicy { field: String, message: String },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an invalid policy error
    pub fn invalid_policy(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPolicy {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

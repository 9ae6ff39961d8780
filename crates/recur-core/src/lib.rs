//! # recur-core
//!
//! Core library for recur providing:
//! - Validated retry policies (max retry count, max delay, backoff shape)
//! - Configuration file parsing (recur.yaml)
//! - Retry execution engine with blocking and cancelable async entry points

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

pub use config::RecurConfig;
pub use error::{Error, Result};
pub use types::RetryPolicy;

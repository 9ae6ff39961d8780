//! Configuration management for recur

mod loader;

pub use loader::{RecurConfig, CONFIG_FILE_NAMES};

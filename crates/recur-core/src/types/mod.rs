//! Type definitions for retry policies and their configuration file form

mod policy;

pub use policy::{RetryPoliciesConfig, RetryPolicy, RetrySettings};

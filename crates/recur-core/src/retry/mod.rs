//! Retry execution engine with policy-based configuration
//!
//! This module runs a caller-supplied operation, classifies its failures as
//! transient or permanent, and re-invokes it with capped, jittered exponential
//! backoff until it succeeds, the retry budget runs out, or a permanent failure
//! is seen.
//!
//! # Features
//!
//! - Blocking (`execute`) and cancelable async (`execute_async`) entry points
//!   sharing one delay computation
//! - Injected, composable transience predicates via the `RetryPredicate` trait
//! - A failure unwrapping hook for backends that wrap the real cause
//! - Observable retries via the `RetryObserver` trait, with a built-in
//!   `TracingObserver`
//! - Nested calls collapse to a single attempt through an explicit
//!   `ExecutionContext` instead of thread-local state
//!
//! # Example
//!
//! ```rust,no_run
//! use recur_core::retry::{retry_with_policy, RetryError};
//! use recur_core::RetryPolicy;
//!
//! async fn example() -> Result<String, RetryError<std::io::Error>> {
//!     let policy = RetryPolicy::default();
//!
//!     retry_with_policy(&policy, |_ctx| async {
//!         // Your fallible operation here
//!         Ok("success".to_string())
//!     }).await
//! }
//! ```

mod context;
mod error;
mod executor;
mod observer;
mod strategies;

pub use context::ExecutionContext;
pub use error::RetryError;
pub use executor::{retry_with_policy, RetryExecutor, RetryExecutorBuilder};
pub use observer::{NoOpObserver, RetryObserver, StatsObserver, TracingObserver};
pub use strategies::{
    compute_delay, AllOf, AlwaysRetry, AnyOf, ClosurePredicate, ClosureUnwrapper,
    FailureUnwrapper, MessagePredicate, NeverRetry, Passthrough, RetryPredicate,
};

//! Retry delay computation, predicates, and failure unwrapping
//!
//! This module implements the capped exponential backoff shared by the
//! blocking and async executors, the trait for deciding whether an error is
//! transient, and the hook for unwrapping envelope errors before they are
//! classified.

use crate::types::RetryPolicy;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

/// Calculate the delay before the next retry attempt
///
/// `attempt_index` is the zero-based index of the failure just recorded (the
/// failure history length minus one). `sample` is a uniform draw from
/// `[0, 1)`; it scales the jitter factor, so the exponential term is
/// multiplied by a value in `[1.0, 1.0 + jitter_factor)`.
///
/// Returns `None` once `attempt_index` reaches the policy's retry count,
/// meaning the budget is exhausted.
///
/// # Example
///
/// ```rust
/// use recur_core::retry::compute_delay;
/// use recur_core::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(5, 30_000).unwrap();
///
/// // (2^0 - 1) * 1s
/// assert_eq!(compute_delay(&policy, 0, 0.0), Some(Duration::ZERO));
/// // (2^2 - 1) * 1s
/// assert_eq!(compute_delay(&policy, 2, 0.0), Some(Duration::from_secs(3)));
/// // budget exhausted
/// assert_eq!(compute_delay(&policy, 5, 0.0), None);
/// ```
pub fn compute_delay(policy: &RetryPolicy, attempt_index: u32, sample: f64) -> Option<Duration> {
    if attempt_index >= policy.max_retry_count() {
        return None;
    }

    let exponent = i32::try_from(attempt_index).unwrap_or(i32::MAX);
    let jitter = 1.0 + sample.clamp(0.0, 1.0) * policy.jitter_factor();
    let delta = (2f64.powi(exponent) - 1.0) * jitter;

    // Microsecond arithmetic keeps whole-millisecond results exact
    let base_us = policy.base_delay().as_secs_f64() * 1_000_000.0;
    let raw_us = if base_us == 0.0 { 0.0 } else { base_us * delta };
    let max_us = policy.max_retry_delay().as_micros() as f64;

    Some(Duration::from_micros(raw_us.min(max_us).round() as u64))
}

/// A predicate that determines whether an error should be retried
///
/// The executor has no built-in notion of which failures are transient; this
/// is supplied by the caller's knowledge of its backend.
///
/// # Example
///
/// ```rust
/// use recur_core::retry::RetryPredicate;
/// use std::io::{Error, ErrorKind};
///
/// struct IoRetryPredicate;
///
/// impl RetryPredicate<Error> for IoRetryPredicate {
///     fn should_retry(&self, error: &Error) -> bool {
///         matches!(
///             error.kind(),
///             ErrorKind::TimedOut | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
///         )
///     }
/// }
/// ```
pub trait RetryPredicate<E: ?Sized>: Send + Sync {
    /// Determine whether the given error should be retried
    fn should_retry(&self, error: &E) -> bool;
}

/// A predicate that always returns true (all errors are retryable)
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl<E: ?Sized> RetryPredicate<E> for AlwaysRetry {
    fn should_retry(&self, _error: &E) -> bool {
        true
    }
}

/// A predicate that never retries (no errors are retryable)
#[derive(Debug, Clone, Copy)]
pub struct NeverRetry;

impl<E: ?Sized> RetryPredicate<E> for NeverRetry {
    fn should_retry(&self, _error: &E) -> bool {
        false
    }
}

/// A predicate that uses a closure to determine retryability
pub struct ClosurePredicate<F> {
    predicate: F,
}

impl<F> ClosurePredicate<F> {
    /// Create a new closure-based predicate
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<E, F> RetryPredicate<E> for ClosurePredicate<F>
where
    F: Fn(&E) -> bool + Send + Sync,
{
    fn should_retry(&self, error: &E) -> bool {
        (self.predicate)(error)
    }
}

/// Retries when either inner predicate does
///
/// Useful for combining the transience rules of several backends.
#[derive(Debug, Clone, Copy)]
pub struct AnyOf<A, B>(pub A, pub B);

impl<E: ?Sized, A: RetryPredicate<E>, B: RetryPredicate<E>> RetryPredicate<E> for AnyOf<A, B> {
    fn should_retry(&self, error: &E) -> bool {
        self.0.should_retry(error) || self.1.should_retry(error)
    }
}

/// Retries only when both inner predicates do
#[derive(Debug, Clone, Copy)]
pub struct AllOf<A, B>(pub A, pub B);

impl<E: ?Sized, A: RetryPredicate<E>, B: RetryPredicate<E>> RetryPredicate<E> for AllOf<A, B> {
    fn should_retry(&self, error: &E) -> bool {
        self.0.should_retry(error) && self.1.should_retry(error)
    }
}

impl<E: ?Sized, P: RetryPredicate<E> + ?Sized> RetryPredicate<E> for Arc<P> {
    fn should_retry(&self, error: &E) -> bool {
        (**self).should_retry(error)
    }
}

impl<E: ?Sized, P: RetryPredicate<E> + ?Sized> RetryPredicate<E> for Box<P> {
    fn should_retry(&self, error: &E) -> bool {
        (**self).should_retry(error)
    }
}

/// A predicate that retries only on specific error messages
#[derive(Debug, Clone)]
pub struct MessagePredicate {
    /// Lowercased patterns that indicate retryable errors
    retryable_patterns: Vec<String>,
}

impl MessagePredicate {
    /// Create a new message predicate with the given patterns
    pub fn new(patterns: Vec<String>) -> Self {
        Self {
            retryable_patterns: patterns.into_iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// Create a predicate for common network errors
    pub fn network_errors() -> Self {
        Self::new(vec![
            "timeout".to_string(),
            "timed out".to_string(),
            "connection reset".to_string(),
            "connection refused".to_string(),
            "network unreachable".to_string(),
            "temporary failure".to_string(),
        ])
    }

    /// Check a rendered message against the patterns
    pub fn matches(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.retryable_patterns
            .iter()
            .any(|pattern| message.contains(pattern.as_str()))
    }
}

impl<E: Error> RetryPredicate<E> for MessagePredicate {
    fn should_retry(&self, error: &E) -> bool {
        self.matches(&error.to_string())
    }
}

/// Maps a raw failure to the failure that should be classified and recorded
///
/// Some backends wrap the real transient cause in a generic envelope. The
/// executor passes every failure of a top-level attempt through this hook
/// before asking the predicate about it.
pub trait FailureUnwrapper<E>: Send + Sync {
    /// Return the failure to classify and record
    fn unwrap_failure(&self, error: E) -> E;
}

/// Leaves failures untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl<E> FailureUnwrapper<E> for Passthrough {
    fn unwrap_failure(&self, error: E) -> E {
        error
    }
}

/// An unwrapper backed by a closure
pub struct ClosureUnwrapper<F> {
    unwrap: F,
}

impl<F> ClosureUnwrapper<F> {
    /// Create a new closure-based unwrapper
    pub fn new(unwrap: F) -> Self {
        Self { unwrap }
    }
}

impl<E, F> FailureUnwrapper<E> for ClosureUnwrapper<F>
where
    F: Fn(E) -> E + Send + Sync,
{
    fn unwrap_failure(&self, error: E) -> E {
        (self.unwrap)(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn policy(max_retry_count: i64, max_retry_delay_ms: i64) -> RetryPolicy {
        RetryPolicy::new(max_retry_count, max_retry_delay_ms).unwrap()
    }

    #[test]
    fn test_backoff_without_jitter() {
        let policy = policy(6, 100_000);

        let expected = [0, 1000, 3000, 7000, 15000, 31000];
        for (index, millis) in expected.iter().enumerate() {
            assert_eq!(
                compute_delay(&policy, index as u32, 0.0),
                Some(Duration::from_millis(*millis)),
                "attempt index {}",
                index
            );
        }
    }

    #[test]
    fn test_exhausted_at_retry_count() {
        let policy = policy(3, 30_000);
        assert!(compute_delay(&policy, 2, 0.5).is_some());
        assert_eq!(compute_delay(&policy, 3, 0.5), None);
        assert_eq!(compute_delay(&policy, 100, 0.5), None);
    }

    #[test]
    fn test_zero_retries_never_delays() {
        let policy = policy(0, 30_000);
        assert_eq!(compute_delay(&policy, 0, 0.0), None);
    }

    #[test]
    fn test_jitter_upper_bound() {
        let policy = policy(6, 100_000);
        // (2^1 - 1) * 1.1 approaches 1100ms but never reaches it
        let delay = compute_delay(&policy, 1, 0.999).unwrap();
        assert!(delay >= Duration::from_millis(1000));
        assert!(delay < Duration::from_millis(1100));

        let delay = compute_delay(&policy, 2, 0.999).unwrap();
        assert!(delay >= Duration::from_millis(3000));
        assert!(delay < Duration::from_millis(3300));
    }

    #[test]
    fn test_max_delay_cap() {
        let policy = policy(10, 5000);
        // (2^4 - 1) * 1s = 15s, capped at 5s
        assert_eq!(
            compute_delay(&policy, 4, 0.0),
            Some(Duration::from_millis(5000))
        );
        assert_eq!(
            compute_delay(&policy, 9, 0.99),
            Some(Duration::from_millis(5000))
        );
    }

    #[test]
    fn test_huge_attempt_index_stays_capped() {
        let policy = policy(i64::from(u32::MAX), 60_000);
        assert_eq!(
            compute_delay(&policy, 5000, 0.5),
            Some(Duration::from_millis(60_000))
        );
    }

    #[test]
    fn test_zero_base_delay() {
        let policy = policy(i64::from(u32::MAX), 60_000)
            .with_base_delay_ms(0)
            .unwrap();
        assert_eq!(compute_delay(&policy, 3, 0.5), Some(Duration::ZERO));
        assert_eq!(compute_delay(&policy, 5000, 0.5), Some(Duration::ZERO));
    }

    #[test]
    fn test_custom_base_delay() {
        let policy = policy(5, 100_000).with_base_delay_ms(100).unwrap();
        assert_eq!(
            compute_delay(&policy, 2, 0.0),
            Some(Duration::from_millis(300))
        );
    }

    #[test]
    fn test_always_retry_predicate() {
        let predicate = AlwaysRetry;
        let error = io::Error::new(io::ErrorKind::NotFound, "not found");

        assert!(predicate.should_retry(&error));
    }

    #[test]
    fn test_never_retry_predicate() {
        let predicate = NeverRetry;
        let error = io::Error::new(io::ErrorKind::TimedOut, "timeout");

        assert!(!predicate.should_retry(&error));
    }

    #[test]
    fn test_closure_predicate() {
        let predicate = ClosurePredicate::new(|err: &io::Error| {
            matches!(
                err.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
            )
        });

        let timeout_err = io::Error::new(io::ErrorKind::TimedOut, "timeout");
        let not_found_err = io::Error::new(io::ErrorKind::NotFound, "not found");

        assert!(predicate.should_retry(&timeout_err));
        assert!(!predicate.should_retry(&not_found_err));
    }

    #[test]
    fn test_combinators() {
        let timed_out = ClosurePredicate::new(|e: &io::Error| e.kind() == io::ErrorKind::TimedOut);
        let mentions_db = MessagePredicate::new(vec!["database".to_string()]);
        let either = AnyOf(timed_out, mentions_db.clone());

        let db_err = io::Error::other("database is restarting");
        let timeout_err = io::Error::new(io::ErrorKind::TimedOut, "slow");
        let other_err = io::Error::other("syntax error");

        assert!(either.should_retry(&db_err));
        assert!(either.should_retry(&timeout_err));
        assert!(!either.should_retry(&other_err));

        let both = AllOf(AlwaysRetry, mentions_db);
        assert!(both.should_retry(&db_err));
        assert!(!both.should_retry(&timeout_err));
    }

    #[test]
    fn test_message_predicate() {
        let predicate = MessagePredicate::network_errors();

        let timeout_err = io::Error::new(io::ErrorKind::TimedOut, "connection timed out");
        let not_found_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let reset_err = io::Error::new(io::ErrorKind::ConnectionReset, "Connection Reset by peer");

        assert!(predicate.should_retry(&timeout_err));
        assert!(!predicate.should_retry(&not_found_err));
        assert!(predicate.should_retry(&reset_err));
    }

    #[test]
    fn test_unwrappers() {
        assert_eq!(Passthrough.unwrap_failure(7), 7);

        let unwrapper = ClosureUnwrapper::new(|n: i32| n * 2);
        assert_eq!(unwrapper.unwrap_failure(7), 14);
    }
}

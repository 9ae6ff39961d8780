//! Retry observation and logging
//!
//! This module provides the `RetryObserver` trait, the extension point where
//! callers plug telemetry into the retry loop. The executor itself never logs;
//! `TracingObserver` turns the callbacks into `tracing` events.

use std::error::Error;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Observer trait for retry events
///
/// Every method has a no-op default, so implementors override only what they
/// need.
///
/// # Example
///
/// ```rust
/// use recur_core::retry::RetryObserver;
/// use std::error::Error;
/// use std::time::Duration;
///
/// struct MetricsObserver {
///     // Your metrics client here
/// }
///
/// impl RetryObserver for MetricsObserver {
///     fn on_retry(&self, failures: &[&dyn Error], delay: Duration) {
///         // Record a retry with the size of the failure history
///     }
///
///     fn on_exhausted(&self, failures: &[&dyn Error]) {
///         // Record exhaustion
///     }
/// }
/// ```
pub trait RetryObserver: Send + Sync {
    /// Called once before the first attempt of a top-level call
    ///
    /// Use it to reset caller-side counters or state. Not called for nested
    /// single-attempt calls.
    fn on_first_execution(&self) {}

    /// Called when an attempt is about to start
    ///
    /// # Arguments
    ///
    /// * `attempt` - The attempt number (1-indexed)
    /// * `max_attempts` - The maximum number of attempts the policy allows
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        let _ = (attempt, max_attempts);
    }

    /// Called before waiting for the next retry
    ///
    /// # Arguments
    ///
    /// * `failures` - Every transient failure of this call so far, oldest first
    /// * `delay` - The delay before the next attempt
    fn on_retry(&self, failures: &[&dyn Error], delay: Duration) {
        let _ = (failures, delay);
    }

    /// Called when the operation succeeds
    ///
    /// # Arguments
    ///
    /// * `attempt` - The attempt number that succeeded (1-indexed)
    /// * `total_duration` - Total time spent across all attempts
    fn on_success(&self, attempt: u32, total_duration: Duration) {
        let _ = (attempt, total_duration);
    }

    /// Called when the retry budget is exhausted
    ///
    /// `failures` is the full history; its last element is the final failure.
    fn on_exhausted(&self, failures: &[&dyn Error]) {
        let _ = failures;
    }

    /// Called when a failure is classified as not retryable
    fn on_non_retryable(&self, attempt: u32, error: &dyn Error) {
        let _ = (attempt, error);
    }

    /// Called when cancellation stops the retry loop
    fn on_cancelled(&self, attempts: u32) {
        let _ = attempts;
    }
}

/// A no-op observer that does nothing
///
/// Use this when you don't need observation but the API requires an observer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {}

/// An observer that logs retry events using the `tracing` crate
///
/// # Log Levels
///
/// - `on_first_execution`, `on_attempt_start`: TRACE / DEBUG
/// - `on_retry`: WARN
/// - `on_success`: INFO (if > 1 attempt) or DEBUG (first attempt)
/// - `on_exhausted`: ERROR, plus one DEBUG event per recorded failure
/// - `on_non_retryable`, `on_cancelled`: WARN
///
/// # Example
///
/// ```rust
/// use recur_core::retry::TracingObserver;
///
/// // Create with operation name for better log context
/// let observer = TracingObserver::new("download");
/// ```
#[derive(Debug, Clone)]
pub struct TracingObserver {
    /// Name of the operation being retried (for log context)
    operation: String,
}

impl TracingObserver {
    /// Create a new tracing observer
    ///
    /// # Arguments
    ///
    /// * `operation` - A descriptive name for the operation being retried
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }

    /// Get the operation name
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new("retry")
    }
}

impl RetryObserver for TracingObserver {
    fn on_first_execution(&self) {
        tracing::trace!(operation = %self.operation, "starting retried execution");
    }

    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        tracing::debug!(
            operation = %self.operation,
            attempt = attempt,
            max_attempts = max_attempts,
            "starting attempt"
        );
    }

    fn on_retry(&self, failures: &[&dyn Error], delay: Duration) {
        if let Some(error) = failures.last() {
            tracing::warn!(
                operation = %self.operation,
                attempt = failures.len(),
                error = %error,
                delay_ms = delay.as_millis() as u64,
                "attempt failed with transient error, will retry"
            );
        }
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        if attempt > 1 {
            tracing::info!(
                operation = %self.operation,
                attempt = attempt,
                total_duration_ms = total_duration.as_millis() as u64,
                "succeeded after retry"
            );
        } else {
            tracing::debug!(
                operation = %self.operation,
                duration_ms = total_duration.as_millis() as u64,
                "succeeded on first attempt"
            );
        }
    }

    fn on_exhausted(&self, failures: &[&dyn Error]) {
        for (index, error) in failures.iter().enumerate() {
            tracing::debug!(
                operation = %self.operation,
                attempt = index + 1,
                error = %error,
                "recorded transient failure"
            );
        }
        if let Some(error) = failures.last() {
            tracing::error!(
                operation = %self.operation,
                attempts = failures.len(),
                error = %error,
                "retry limit exceeded"
            );
        }
    }

    fn on_non_retryable(&self, attempt: u32, error: &dyn Error) {
        tracing::warn!(
            operation = %self.operation,
            attempt = attempt,
            error = %error,
            "giving up on non-retryable error"
        );
    }

    fn on_cancelled(&self, attempts: u32) {
        tracing::warn!(
            operation = %self.operation,
            attempts = attempts,
            "retry cancelled"
        );
    }
}

/// An observer that collects statistics about retry attempts
///
/// Useful for testing and metrics collection.
#[derive(Debug, Default)]
pub struct StatsObserver {
    /// First execution events
    pub first_executions: AtomicU32,
    /// Attempt start events
    pub attempt_starts: AtomicU32,
    /// Retry events
    pub retries: AtomicU32,
    /// Success events
    pub successes: AtomicU32,
    /// Exhaustion events
    pub exhaustions: AtomicU32,
    /// Non-retryable failure events
    pub non_retryable: AtomicU32,
    /// Cancellation events
    pub cancellations: AtomicU32,
    /// Delay and failure history length for every retry, in order
    retry_log: Mutex<Vec<(Duration, usize)>>,
}

impl StatsObserver {
    /// Create a new stats observer
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of first execution events
    pub fn first_executions(&self) -> u32 {
        self.first_executions.load(Ordering::SeqCst)
    }

    /// Get the number of attempt starts
    pub fn attempt_starts(&self) -> u32 {
        self.attempt_starts.load(Ordering::SeqCst)
    }

    /// Get the number of retries
    pub fn retries(&self) -> u32 {
        self.retries.load(Ordering::SeqCst)
    }

    /// Get the number of successes
    pub fn successes(&self) -> u32 {
        self.successes.load(Ordering::SeqCst)
    }

    /// Get the number of exhaustions
    pub fn exhaustions(&self) -> u32 {
        self.exhaustions.load(Ordering::SeqCst)
    }

    /// Get the number of non-retryable failures
    pub fn non_retryable(&self) -> u32 {
        self.non_retryable.load(Ordering::SeqCst)
    }

    /// Get the number of cancellations
    pub fn cancellations(&self) -> u32 {
        self.cancellations.load(Ordering::SeqCst)
    }

    /// Delays announced by `on_retry`, in order
    pub fn delays(&self) -> Vec<Duration> {
        self.log().iter().map(|(delay, _)| *delay).collect()
    }

    /// Failure history lengths seen by `on_retry`, in order
    pub fn history_lengths(&self) -> Vec<usize> {
        self.log().iter().map(|(_, len)| *len).collect()
    }

    fn log(&self) -> std::sync::MutexGuard<'_, Vec<(Duration, usize)>> {
        self.retry_log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RetryObserver for StatsObserver {
    fn on_first_execution(&self) {
        self.first_executions.fetch_add(1, Ordering::SeqCst);
    }

    fn on_attempt_start(&self, _attempt: u32, _max_attempts: u32) {
        self.attempt_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_retry(&self, failures: &[&dyn Error], delay: Duration) {
        self.retries.fetch_add(1, Ordering::SeqCst);
        self.log().push((delay, failures.len()));
    }

    fn on_success(&self, _attempt: u32, _total_duration: Duration) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_exhausted(&self, _failures: &[&dyn Error]) {
        self.exhaustions.fetch_add(1, Ordering::SeqCst);
    }

    fn on_non_retryable(&self, _attempt: u32, _error: &dyn Error) {
        self.non_retryable.fetch_add(1, Ordering::SeqCst);
    }

    fn on_cancelled(&self, _attempts: u32) {
        self.cancellations.fetch_add(1, Ordering::SeqCst);
    }
}

/// Implement RetryObserver for Arc<T> where T: RetryObserver
impl<T: RetryObserver + ?Sized> RetryObserver for std::sync::Arc<T> {
    fn on_first_execution(&self) {
        (**self).on_first_execution()
    }

    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        (**self).on_attempt_start(attempt, max_attempts)
    }

    fn on_retry(&self, failures: &[&dyn Error], delay: Duration) {
        (**self).on_retry(failures, delay)
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        (**self).on_success(attempt, total_duration)
    }

    fn on_exhausted(&self, failures: &[&dyn Error]) {
        (**self).on_exhausted(failures)
    }

    fn on_non_retryable(&self, attempt: u32, error: &dyn Error) {
        (**self).on_non_retryable(attempt, error)
    }

    fn on_cancelled(&self, attempts: u32) {
        (**self).on_cancelled(attempts)
    }
}

/// Implement RetryObserver for Box<T> where T: RetryObserver
impl<T: RetryObserver + ?Sized> RetryObserver for Box<T> {
    fn on_first_execution(&self) {
        (**self).on_first_execution()
    }

    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        (**self).on_attempt_start(attempt, max_attempts)
    }

    fn on_retry(&self, failures: &[&dyn Error], delay: Duration) {
        (**self).on_retry(failures, delay)
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        (**self).on_success(attempt, total_duration)
    }

    fn on_exhausted(&self, failures: &[&dyn Error]) {
        (**self).on_exhausted(failures)
    }

    fn on_non_retryable(&self, attempt: u32, error: &dyn Error) {
        (**self).on_non_retryable(attempt, error)
    }

    fn on_cancelled(&self, attempts: u32) {
        (**self).on_cancelled(attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_noop_observer() {
        let observer = NoOpObserver;
        let error = io::Error::other("test");

        // These should all be no-ops
        observer.on_first_execution();
        observer.on_attempt_start(1, 3);
        observer.on_retry(&[&error], Duration::from_millis(100));
        observer.on_success(2, Duration::from_millis(500));
        observer.on_exhausted(&[&error]);
        observer.on_non_retryable(2, &error);
        observer.on_cancelled(2);
    }

    #[test]
    fn test_stats_observer() {
        let observer = StatsObserver::new();
        let first = io::Error::other("first");
        let second = io::Error::other("second");

        observer.on_first_execution();
        observer.on_attempt_start(1, 3);
        observer.on_retry(&[&first], Duration::from_millis(0));
        observer.on_attempt_start(2, 3);
        observer.on_retry(&[&first, &second], Duration::from_millis(1000));
        observer.on_attempt_start(3, 3);
        observer.on_success(3, Duration::from_millis(1500));

        assert_eq!(observer.first_executions(), 1);
        assert_eq!(observer.attempt_starts(), 3);
        assert_eq!(observer.retries(), 2);
        assert_eq!(observer.successes(), 1);
        assert_eq!(observer.exhaustions(), 0);
        assert_eq!(
            observer.delays(),
            vec![Duration::ZERO, Duration::from_millis(1000)]
        );
        assert_eq!(observer.history_lengths(), vec![1, 2]);
    }

    #[test]
    fn test_tracing_observer_creation() {
        let observer = TracingObserver::new("test_operation");
        assert_eq!(observer.operation, "test_operation");

        let default_observer = TracingObserver::default();
        assert_eq!(default_observer.operation, "retry");
    }

    #[test]
    fn test_arc_observer() {
        let observer = std::sync::Arc::new(StatsObserver::new());
        let error = io::Error::other("test");

        observer.on_attempt_start(1, 3);
        observer.on_retry(&[&error], Duration::from_millis(100));
        observer.on_cancelled(1);

        assert_eq!(observer.attempt_starts(), 1);
        assert_eq!(observer.retries(), 1);
        assert_eq!(observer.cancellations(), 1);
    }
}

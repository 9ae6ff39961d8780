//! Error types for the retry execution engine
//!
//! This module defines the terminal outcomes of a retried call other than
//! success: a failure surfaced unchanged, an exhausted retry budget, and
//! cancellation.

use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Errors that can occur during retry execution
///
/// The error type is generic over `E`, the underlying error type from the
/// operation being retried.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The operation's own failure, surfaced without further retries
    ///
    /// Returned when the predicate classifies a failure as not retryable, and
    /// when a nested call inside an in-flight attempt runs its single attempt.
    /// The value is exactly what the operation produced.
    Operation(E),

    /// The retry budget was exhausted while failures were still transient
    LimitExceeded {
        /// Every transient failure encountered, oldest first; never empty
        failures: Vec<E>,
        /// Total duration spent across all attempts and waits
        total_duration: Duration,
    },

    /// Cancellation was observed before an attempt or during a wait
    Cancelled {
        /// Number of attempts started before cancellation
        attempts: u32,
        /// Transient failures encountered before cancellation, oldest first
        failures: Vec<E>,
    },
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Operation(source) => write!(f, "{}", source),
            RetryError::LimitExceeded {
                failures,
                total_duration,
            } => {
                write!(
                    f,
                    "retry limit exceeded after {} attempts over {:.2}s",
                    failures.len(),
                    total_duration.as_secs_f64()
                )?;
                if let Some(last) = failures.last() {
                    write!(f, ": {}", last)?;
                }
                Ok(())
            }
            RetryError::Cancelled { attempts, failures } => {
                if let Some(last) = failures.last() {
                    write!(f, "retry cancelled after {} attempts: {}", attempts, last)
                } else {
                    write!(f, "retry cancelled after {} attempts", attempts)
                }
            }
        }
    }
}

impl<E: Error + 'static> Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            // Display already renders the operation's error verbatim
            RetryError::Operation(source) => source.source(),
            RetryError::LimitExceeded { failures, .. } | RetryError::Cancelled { failures, .. } => {
                failures.last().map(|e| e as &(dyn Error + 'static))
            }
        }
    }
}

impl<E> RetryError<E> {
    /// Create an operation error
    pub fn operation(source: E) -> Self {
        RetryError::Operation(source)
    }

    /// Create a limit exceeded error from a non-empty failure history
    pub fn limit_exceeded(failures: Vec<E>, total_duration: Duration) -> Self {
        debug_assert!(!failures.is_empty(), "failure history must not be empty");
        RetryError::LimitExceeded {
            failures,
            total_duration,
        }
    }

    /// Create a cancelled error
    pub fn cancelled(attempts: u32, failures: Vec<E>) -> Self {
        RetryError::Cancelled { attempts, failures }
    }

    /// Get the number of attempts made
    ///
    /// Nested single attempts and non-retryable failures report the attempt
    /// that produced the error only, since earlier attempts are not retained.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Operation(_) => 1,
            RetryError::LimitExceeded { failures, .. } => {
                u32::try_from(failures.len()).unwrap_or(u32::MAX)
            }
            RetryError::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// Check if this error surfaces the operation's failure directly
    pub fn is_operation(&self) -> bool {
        matches!(self, RetryError::Operation(_))
    }

    /// Check if this error indicates the retry budget was exhausted
    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, RetryError::LimitExceeded { .. })
    }

    /// Check if this error indicates cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }

    /// The transient failure history
    ///
    /// Empty for `Operation`; that failure was never recorded as transient.
    pub fn failures(&self) -> &[E] {
        match self {
            RetryError::Operation(_) => &[],
            RetryError::LimitExceeded { failures, .. } | RetryError::Cancelled { failures, .. } => {
                failures
            }
        }
    }

    /// The most recent failure, if any
    pub fn last_failure(&self) -> Option<&E> {
        match self {
            RetryError::Operation(source) => Some(source),
            _ => self.failures().last(),
        }
    }

    /// Get the most recent underlying error, consuming this error
    pub fn into_source(self) -> Option<E> {
        match self {
            RetryError::Operation(source) => Some(source),
            RetryError::LimitExceeded { mut failures, .. }
            | RetryError::Cancelled { mut failures, .. } => failures.pop(),
        }
    }

    /// Map the error type using a closure
    pub fn map_err<F, E2>(self, mut f: F) -> RetryError<E2>
    where
        F: FnMut(E) -> E2,
    {
        match self {
            RetryError::Operation(source) => RetryError::Operation(f(source)),
            RetryError::LimitExceeded {
                failures,
                total_duration,
            } => RetryError::LimitExceeded {
                failures: failures.into_iter().map(&mut f).collect(),
                total_duration,
            },
            RetryError::Cancelled { attempts, failures } => RetryError::Cancelled {
                attempts,
                failures: failures.into_iter().map(&mut f).collect(),
            },
        }
    }
}

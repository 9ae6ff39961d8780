//! Retry execution engine
//!
//! This module provides the core retry loop with configurable policies,
//! predicates, unwrappers, and observers. The blocking and async entry points
//! share the failure bookkeeping and delay computation; only the way they
//! wait differs.

use std::error::Error;
use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::types::RetryPolicy;

use super::context::ExecutionContext;
use super::error::RetryError;
use super::observer::{NoOpObserver, RetryObserver};
use super::strategies::{compute_delay, AlwaysRetry, FailureUnwrapper, Passthrough, RetryPredicate};

/// Execute an async operation with retry logic based on a policy
///
/// This is a convenience function for simple retry scenarios: every error is
/// treated as transient and no cancellation is wired in. For more control,
/// use `RetryExecutorBuilder`.
///
/// # Example
///
/// ```rust,no_run
/// use recur_core::retry::retry_with_policy;
/// use recur_core::RetryPolicy;
///
/// async fn example() {
///     let policy = RetryPolicy::default();
///
///     let result = retry_with_policy(&policy, |_ctx| async {
///         // Simulated operation that might fail
///         Ok::<_, std::io::Error>("success")
///     }).await;
/// }
/// ```
pub async fn retry_with_policy<F, Fut, T, E>(policy: &RetryPolicy, op: F) -> Result<T, RetryError<E>>
where
    F: FnMut(ExecutionContext) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Error + 'static,
{
    let executor = RetryExecutorBuilder::new()
        .with_policy(policy.clone())
        .build();
    executor.execute_async(op, &CancellationToken::new()).await
}

/// Builder for configuring a `RetryExecutor`
///
/// # Example
///
/// ```rust
/// use recur_core::retry::{MessagePredicate, RetryExecutorBuilder, TracingObserver};
/// use recur_core::RetryPolicy;
///
/// let executor = RetryExecutorBuilder::new()
///     .with_policy(RetryPolicy::new(3, 5000).unwrap())
///     .with_predicate(MessagePredicate::network_errors())
///     .with_observer(TracingObserver::new("query"))
///     .build();
/// ```
pub struct RetryExecutorBuilder<P = AlwaysRetry, O = NoOpObserver, U = Passthrough> {
    policy: RetryPolicy,
    predicate: P,
    observer: O,
    unwrapper: U,
    jitter: bool,
}

impl Default for RetryExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryExecutorBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::default(),
            predicate: AlwaysRetry,
            observer: NoOpObserver,
            unwrapper: Passthrough,
            jitter: true,
        }
    }
}

impl<P, O, U> RetryExecutorBuilder<P, O, U> {
    /// Set the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the retry predicate
    ///
    /// The predicate determines whether an error is transient.
    pub fn with_predicate<P2>(self, predicate: P2) -> RetryExecutorBuilder<P2, O, U> {
        RetryExecutorBuilder {
            policy: self.policy,
            predicate,
            observer: self.observer,
            unwrapper: self.unwrapper,
            jitter: self.jitter,
        }
    }

    /// Set the observer
    ///
    /// The observer receives callbacks during retry execution.
    pub fn with_observer<O2>(self, observer: O2) -> RetryExecutorBuilder<P, O2, U> {
        RetryExecutorBuilder {
            policy: self.policy,
            predicate: self.predicate,
            observer,
            unwrapper: self.unwrapper,
            jitter: self.jitter,
        }
    }

    /// Set the failure unwrapper
    ///
    /// The unwrapper maps each failure to the one that is classified and
    /// recorded.
    pub fn with_unwrapper<U2>(self, unwrapper: U2) -> RetryExecutorBuilder<P, O, U2> {
        RetryExecutorBuilder {
            policy: self.policy,
            predicate: self.predicate,
            observer: self.observer,
            unwrapper,
            jitter: self.jitter,
        }
    }

    /// Enable or disable jitter
    ///
    /// Without jitter every delay is exactly `(2^n - 1) * base_delay`, capped.
    /// Enabled by default.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Build the executor
    pub fn build(self) -> RetryExecutor<P, O, U> {
        RetryExecutor {
            policy: self.policy,
            predicate: self.predicate,
            observer: self.observer,
            unwrapper: self.unwrapper,
            jitter: self.jitter,
        }
    }
}

/// A retry executor with configurable policy, predicate, observer and unwrapper
///
/// The executor holds no per-call state: failure history and attempt count
/// live on the stack of each call, so one instance can serve any number of
/// concurrent executions. Use `RetryExecutorBuilder` to create an instance.
pub struct RetryExecutor<P = AlwaysRetry, O = NoOpObserver, U = Passthrough> {
    policy: RetryPolicy,
    predicate: P,
    observer: O,
    unwrapper: U,
    jitter: bool,
}

impl<P, O, U> RetryExecutor<P, O, U>
where
    O: RetryObserver,
{
    /// The policy this executor enforces
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute a blocking operation with retry logic
    ///
    /// The calling thread sleeps between attempts. The operation receives the
    /// context of its attempt; pass it to `execute_in` to route a nested call
    /// through this (or another) executor without compounding retries.
    pub fn execute<F, T, E>(&self, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(&ExecutionContext) -> Result<T, E>,
        E: Error + 'static,
        P: RetryPredicate<E>,
        U: FailureUnwrapper<E>,
    {
        self.execute_in(&ExecutionContext::new(), op)
    }

    /// Execute a blocking operation within an existing execution context
    ///
    /// If `ctx` belongs to an in-flight attempt, the operation runs exactly
    /// once and its failure is returned as `RetryError::Operation`.
    pub fn execute_in<F, T, E>(&self, ctx: &ExecutionContext, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(&ExecutionContext) -> Result<T, E>,
        E: Error + 'static,
        P: RetryPredicate<E>,
        U: FailureUnwrapper<E>,
    {
        if ctx.is_suspended() {
            return op(ctx).map_err(RetryError::Operation);
        }

        let start = Instant::now();
        let mut failures: Vec<E> = Vec::new();
        self.observer.on_first_execution();

        loop {
            let attempt = self.begin_attempt(&failures);

            match op(&ctx.suspended()) {
                Ok(result) => {
                    self.observer.on_success(attempt, start.elapsed());
                    return Ok(result);
                }
                Err(err) => {
                    let delay = self.handle_failure(attempt, err, &mut failures, start)?;
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
            }
        }
    }

    /// Execute an async operation with retry logic and cancellation
    ///
    /// Cancellation is checked before every attempt and raced against every
    /// wait. An attempt already in flight is never interrupted; the request is
    /// observed at the next check point.
    pub async fn execute_async<F, Fut, T, E>(
        &self,
        op: F,
        cancellation: &CancellationToken,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(ExecutionContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
        P: RetryPredicate<E>,
        U: FailureUnwrapper<E>,
    {
        let ctx = ExecutionContext::with_cancellation(cancellation.clone());
        self.execute_async_in(&ctx, op).await
    }

    /// Execute an async operation within an existing execution context
    ///
    /// The nested counterpart of `execute_async`; see `execute_in`.
    pub async fn execute_async_in<F, Fut, T, E>(
        &self,
        ctx: &ExecutionContext,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(ExecutionContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + 'static,
        P: RetryPredicate<E>,
        U: FailureUnwrapper<E>,
    {
        if ctx.is_suspended() {
            return op(ctx.clone()).await.map_err(RetryError::Operation);
        }

        let start = Instant::now();
        let mut failures: Vec<E> = Vec::new();
        self.observer.on_first_execution();

        loop {
            if ctx.is_cancelled() {
                return Err(self.cancelled(failures));
            }

            let attempt = self.begin_attempt(&failures);

            match op(ctx.suspended()).await {
                Ok(result) => {
                    self.observer.on_success(attempt, start.elapsed());
                    return Ok(result);
                }
                Err(err) => {
                    let delay = self.handle_failure(attempt, err, &mut failures, start)?;
                    tokio::select! {
                        biased;
                        _ = ctx.cancellation().cancelled() => {
                            return Err(self.cancelled(failures));
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    fn begin_attempt<E>(&self, failures: &[E]) -> u32 {
        let attempt = u32::try_from(failures.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        self.observer
            .on_attempt_start(attempt, self.policy.max_attempts());
        attempt
    }

    /// Classify a failure and either return the delay before the next attempt
    /// or the terminal error
    fn handle_failure<E>(
        &self,
        attempt: u32,
        err: E,
        failures: &mut Vec<E>,
        start: Instant,
    ) -> Result<Duration, RetryError<E>>
    where
        E: Error + 'static,
        P: RetryPredicate<E>,
        U: FailureUnwrapper<E>,
    {
        let err = self.unwrapper.unwrap_failure(err);

        if !self.predicate.should_retry(&err) {
            self.observer.on_non_retryable(attempt, &err);
            return Err(RetryError::operation(err));
        }

        failures.push(err);
        let attempt_index = u32::try_from(failures.len() - 1).unwrap_or(u32::MAX);

        match compute_delay(&self.policy, attempt_index, self.jitter_sample()) {
            Some(delay) => {
                self.observer.on_retry(&as_dyn(failures), delay);
                Ok(delay)
            }
            None => {
                self.observer.on_exhausted(&as_dyn(failures));
                Err(RetryError::limit_exceeded(
                    std::mem::take(failures),
                    start.elapsed(),
                ))
            }
        }
    }

    fn cancelled<E>(&self, failures: Vec<E>) -> RetryError<E> {
        let attempts = u32::try_from(failures.len()).unwrap_or(u32::MAX);
        self.observer.on_cancelled(attempts);
        RetryError::cancelled(attempts, failures)
    }

    fn jitter_sample(&self) -> f64 {
        if self.jitter {
            rand::rng().random::<f64>()
        } else {
            0.0
        }
    }
}

fn as_dyn<E: Error + 'static>(failures: &[E]) -> Vec<&dyn Error> {
    failures.iter().map(|e| e as &dyn Error).collect()
}

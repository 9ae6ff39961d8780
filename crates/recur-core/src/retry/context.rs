//! Per-execution context threaded through retried operations
//!
//! The context replaces ambient, thread-affine state: every attempt receives a
//! suspended copy, and an operation that routes another call through an
//! executor hands that copy back via `execute_in` / `execute_async_in`. The
//! nested call then runs exactly once. Because the caller's own copy is never
//! mutated, the flag is naturally cleared once the attempt returns, and two
//! concurrent executions can never observe each other's flag.

use tokio_util::sync::CancellationToken;

/// Context for one logical execution
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    suspended: bool,
    cancellation: CancellationToken,
}

impl ExecutionContext {
    /// A fresh, top-level context with its own (never cancelled) token
    pub fn new() -> Self {
        Self::default()
    }

    /// A top-level context observing `token`
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            suspended: false,
            cancellation: token,
        }
    }

    /// Whether an attempt of an enclosing retry loop is in flight
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// The cancellation token for this execution
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// The copy handed to an attempt
    pub(crate) fn suspended(&self) -> Self {
        Self {
            suspended: true,
            cancellation: self.cancellation.clone(),
        }
    }
}

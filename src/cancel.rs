//! One-shot broadcast cancellation for pipeline stages.
//!
//! Every stage holds a [`CancelToken`] and races it against its blocking
//! channel operations, so no stage can stay blocked past a cancellation.
//! The trigger side is a [`CancelGuard`]: cancellation fires when the guard
//! drops, on whatever exit path, and at most once.

use tokio_util::sync::{CancellationToken, DropGuard};

/// A one-shot, broadcast stop flag observed by every pipeline stage.
///
/// This is a thin wrapper around [`tokio_util::sync::CancellationToken`],
/// providing a consistent API with the rest of the pipeline vocabulary.
/// The token has two observable states, open and cancelled, and only ever
/// transitions from open to cancelled, exactly once. Cancelling wakes every waiter
/// simultaneously; cancelling again (or concurrently from several callers)
/// is a no-op.
///
/// Clones share state: any clone can cancel, every clone observes it.
///
/// # Example
///
/// ```rust
/// use sluice::cancel::CancelToken;
///
/// let token = CancelToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// token.cancel(); // idempotent
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: CancellationToken,
}

impl CancelToken {
    /// Create a new, open token.
    pub fn new() -> Self {
        Self {
            inner: CancellationToken::new(),
        }
    }

    /// Cancel the token, waking every waiter.
    ///
    /// Safe to call more than once and from any number of tasks
    /// concurrently; only the first call has an effect.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Non-blocking check: has the token been cancelled?
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Wait until the token is cancelled.
    ///
    /// Resolves immediately if cancellation already happened, and never
    /// blocks past it. Usable inside `tokio::select!` as one arm of a
    /// combined "operation or cancel" wait.
    pub async fn cancelled(&self) {
        self.inner.cancelled().await;
    }

    /// Acquire a guard that cancels this token when dropped.
    ///
    /// This is the scoped-release trigger: whoever owns the guard is the
    /// shutdown origin, and release is guaranteed on every exit path
    /// (including panics) without ever double-firing.
    pub fn guard(&self) -> CancelGuard {
        CancelGuard {
            inner: self.inner.clone().drop_guard(),
        }
    }
}

/// Scoped cancellation trigger: cancels its [`CancelToken`] on drop.
///
/// Obtained from [`CancelToken::guard`]. Use [`disarm`](CancelGuard::disarm)
/// to release the guard without cancelling.
#[derive(Debug)]
pub struct CancelGuard {
    inner: DropGuard,
}

impl CancelGuard {
    /// Release the guard without cancelling, returning the token.
    pub fn disarm(self) -> CancelToken {
        CancelToken {
            inner: self.inner.disarm(),
        }
    }
}

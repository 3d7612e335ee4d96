// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cooperative cancellation for in-flight pipeline runs.
//!
//! A [`CancellationToken`] is handed to the executor before a run starts;
//! the executor checks it between stages and a caller (the HTTP adapter
//! enforcing a request deadline, or the CLI's `Ctrl-C` handler) can signal
//! it from another task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Why a [`CancellationToken`] was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationReason {
    /// The caller's deadline elapsed before the run finished.
    DeadlineExceeded,
    /// The caller explicitly gave up (e.g. the HTTP client disconnected).
    CallerAbandoned,
    /// The process is shutting down.
    Shutdown,
}

struct TokenInner {
    cancelled: AtomicBool,
    reason: std::sync::Mutex<Option<CancellationReason>>,
    notify: Notify,
}

/// A cheaply-cloneable handle that can be cancelled from any task; all
/// clones observe the same cancellation.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    /// A fresh, not-yet-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                reason: std::sync::Mutex::new(None),
                notify: Notify::new(),
            }),
        }
    }

    /// Cancel this token and every clone of it. Only the first call's
    /// reason is retained; later calls are no-ops.
    pub fn cancel(&self, reason: CancellationReason) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            *self.inner.reason.lock().unwrap() = Some(reason);
            self.inner.notify.notify_waiters();
        }
    }

    /// `true` if this token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// The reason this token was cancelled, if it has been.
    #[must_use]
    pub fn reason(&self) -> Option<CancellationReason> {
        *self.inner.reason.lock().unwrap()
    }

    /// Wait until this token is cancelled. Resolves immediately if it
    /// already is.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        let notified = self.inner.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

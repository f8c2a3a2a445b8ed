// SPDX-License-Identifier: MIT

//! Cooperative cancellation token with a tagged reason.
//!
//! Replaces the three-booleans-on-a-struct pattern with a single token that
//! carries exactly one [`CancelReason`] once fired. Firing is idempotent:
//! the first reason to land wins, later firings are no-ops.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Why a [`CancelToken`] fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelReason {
    /// A user or control-plane request to cancel a specific document.
    Canceled,
    /// Process-wide shutdown (signal, or the owning pool draining).
    ShutDown,
    /// The associated deadline elapsed.
    TimedOut,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CancelReason::Canceled => "canceled",
            CancelReason::ShutDown => "shutdown",
            CancelReason::TimedOut => "timed_out",
        })
    }
}

const NONE: u8 = 0;
const CANCELED: u8 = 1;
const SHUTDOWN: u8 = 2;
const TIMED_OUT: u8 = 3;

fn reason_to_tag(r: CancelReason) -> u8 {
    match r {
        CancelReason::Canceled => CANCELED,
        CancelReason::ShutDown => SHUTDOWN,
        CancelReason::TimedOut => TIMED_OUT,
    }
}

fn tag_to_reason(t: u8) -> Option<CancelReason> {
    match t {
        CANCELED => Some(CancelReason::Canceled),
        SHUTDOWN => Some(CancelReason::ShutDown),
        TIMED_OUT => Some(CancelReason::TimedOut),
        _ => None,
    }
}

struct Inner {
    tag: AtomicU8,
    notify: Notify,
}

/// A cooperative cancellation signal, associated 1:1 with a submitted job.
///
/// Cheap to poll (`is_canceled`), idempotent to fire (`cancel`), and cloneable
/// so both the owner (worker pool) and the consumer (a plugin) can hold it.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner { tag: AtomicU8::new(NONE), notify: Notify::new() }),
        }
    }

    /// Fire the token with the given reason. No-op if already fired.
    pub fn cancel(&self, reason: CancelReason) {
        let tag = reason_to_tag(reason);
        if self
            .inner
            .tag
            .compare_exchange(NONE, tag, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.inner.notify.notify_waiters();
        }
    }

    /// The reason this token fired, if it has.
    pub fn reason(&self) -> Option<CancelReason> {
        tag_to_reason(self.inner.tag.load(Ordering::SeqCst))
    }

    /// True once `cancel` has been called with any reason.
    pub fn is_canceled(&self) -> bool {
        self.reason().is_some()
    }

    /// Resolves once the token fires.
    pub async fn canceled(&self) {
        if self.is_canceled() {
            return;
        }
        let notified = self.inner.notify.notified();
        if self.is_canceled() {
            return;
        }
        notified.await;
    }

    /// A child token that derives from this one plus its own timeout.
    ///
    /// Fires with [`CancelReason::TimedOut`] if `duration` elapses first, or
    /// propagates the parent's reason if the parent fires first.
    pub fn child_with_timeout(&self, duration: std::time::Duration) -> CancelToken {
        let child = CancelToken::new();
        let parent = self.clone();
        let child_for_timer = child.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = parent.canceled() => {
                    if let Some(reason) = parent.reason() {
                        child_for_timer.cancel(reason);
                    }
                }
                _ = tokio::time::sleep(duration) => {
                    child_for_timer.cancel(CancelReason::TimedOut);
                }
                _ = child_for_timer.canceled() => {}
            }
        });
        child
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "cancel_tests.rs"]
mod tests;

//! Shared cancellation handle (§5 "Cancellation")
//!
//! A single handle is shared by all per-book tasks (segmenter, TTS workers,
//! completion watcher) and by every downstream RPC so in-flight provider
//! calls can be cancelled too.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Trip cancellation; idempotent, wakes every waiter
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Resolves immediately if already cancelled, else waits for `cancel()`
    pub async fn cancelled(&self) {
        // Register as a waiter before checking the flag: if `cancel()` runs
        // between the check and the `.notified()` call, the wakeup would
        // otherwise be lost and this future would never resolve.
        let notified = self.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_is_observed() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
        token.cancelled().await; // must resolve immediately, not hang
    }

    #[tokio::test]
    async fn cancel_wakes_pending_waiter() {
        let token = CancellationToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });
        tokio::task::yield_now().await;
        token.cancel();
        tokio::time::timeout(std::time::Duration::from_millis(500), handle)
            .await
            .expect("cancellation should wake the waiter")
            .unwrap();
    }
}

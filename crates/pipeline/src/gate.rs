//! The initial voice-mapping gate (§4.5 "Initial mapping barrier").
//!
//! Two distinct things are guarded here: the segmenter's blocking wait for
//! `mapping_done`, which many observers may witness, and the "queue every
//! already-produced segment" action, which must run exactly once per book
//! regardless of which caller triggers `apply_voice_mapping` first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Clone)]
pub struct MappingGate {
    done: Arc<AtomicBool>,
    notify: Arc<Notify>,
    enqueue_claimed: Arc<AtomicBool>,
}

impl MappingGate {
    pub fn new() -> Self {
        Self {
            done: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
            enqueue_claimed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Resolves immediately if the gate already opened, else waits for
    /// `open()`.
    pub async fn wait(&self) {
        // Register as a waiter before checking `done`: if `open()` runs
        // between the check and the `.notified()` call, the wakeup would
        // otherwise be lost and this future would never resolve.
        let notified = self.notify.notified();
        if self.is_done() {
            return;
        }
        notified.await;
    }

    /// Opens the gate, waking every waiter. Idempotent.
    pub fn open(&self) {
        self.done.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Returns `true` for exactly one caller across the lifetime of this
    /// gate; every subsequent call returns `false`. Callers use this to
    /// decide whether they are the one responsible for the initial
    /// enqueue-all-existing-segments action.
    pub fn claim_initial_enqueue(&self) -> bool {
        self.enqueue_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for MappingGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_resolves_immediately_once_open() {
        let gate = MappingGate::new();
        gate.open();
        gate.wait().await;
    }

    #[tokio::test]
    async fn wait_wakes_pending_waiter() {
        let gate = MappingGate::new();
        let waiter = gate.clone();
        let handle = tokio::spawn(async move {
            waiter.wait().await;
        });
        tokio::task::yield_now().await;
        gate.open();
        tokio::time::timeout(std::time::Duration::from_millis(500), handle)
            .await
            .expect("gate open should wake the waiter")
            .unwrap();
    }

    #[test]
    fn claim_initial_enqueue_is_exactly_once() {
        let gate = MappingGate::new();
        assert!(gate.claim_initial_enqueue());
        assert!(!gate.claim_initial_enqueue());
        assert!(!gate.claim_initial_enqueue());
    }
}

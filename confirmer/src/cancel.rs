//! One-shot, per-loop cancellation.
//!
//! Each worker loop gets its own handle; the watcher fires them all when
//! confirmation is observed. Built on a capacity-1 broadcast channel so
//! that cancelling is instantaneous for the canceller, and a fired flag so
//! that cancelling an already-cancelled handle is a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// Cancels one loop. Cloneable; all clones fire the same signal.
#[derive(Clone)]
pub struct CancelHandle {
    tx: broadcast::Sender<()>,
    fired: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A handle with nothing behind it, for loops that were never started.
    pub fn noop() -> Self {
        Self::new()
    }

    /// Get a receiver for the loop to `select!` on.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire the signal exactly once. Idempotent; a handle with no
    /// subscribed loop is a no-op.
    pub fn cancel(&self) {
        if !self.fired.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(());
        }
    }

    /// Whether the signal has been fired.
    pub fn is_cancelled(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[tokio::test]
    async fn cancel_notifies_subscriber() {
        let handle = CancelHandle::new();
        let mut rx = handle.subscribe();
        assert!(!handle.is_cancelled());
        handle.cancel();
        assert!(handle.is_cancelled());
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn cancel_twice_notifies_once() {
        let handle = CancelHandle::new();
        let mut rx = handle.subscribe();
        handle.cancel();
        handle.cancel();
        assert!(rx.recv().await.is_ok());
        // No second notification was queued.
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn noop_handle_cancels_without_subscribers() {
        let handle = CancelHandle::noop();
        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn clones_share_the_signal() {
        let handle = CancelHandle::new();
        let mut rx = handle.subscribe();
        handle.clone().cancel();
        assert!(rx.recv().await.is_ok());
        assert!(handle.is_cancelled());
    }
}

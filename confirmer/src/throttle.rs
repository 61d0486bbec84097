//! Coarse process-wide load shedding.
//!
//! Every live confirmer loop registers itself in a global gauge. When the
//! gauge exceeds a task's slow-down threshold, that task's promotability
//! check doubles its polling period, shielding the shared gateway and CPU
//! from probe storms when many tasks run at once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

static ACTIVE_LOOPS: AtomicUsize = AtomicUsize::new(0);

/// Number of confirmer loops currently running in this process.
pub fn active_loops() -> usize {
    ACTIVE_LOOPS.load(Ordering::Relaxed)
}

/// Double `base` while the process is over `threshold` active loops.
pub fn corrected_period(base: Duration, threshold: usize) -> Duration {
    if active_loops() > threshold {
        base * 2
    } else {
        base
    }
}

/// Counts one live loop for as long as it is held.
pub(crate) struct LoopGuard(());

impl LoopGuard {
    pub fn enter() -> Self {
        ACTIVE_LOOPS.fetch_add(1, Ordering::Relaxed);
        Self(())
    }
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        ACTIVE_LOOPS.fetch_sub(1, Ordering::Relaxed);
    }
}

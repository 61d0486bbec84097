//! Mutable confirmation-task state.
//!
//! One instance per running task, owned behind the task's single lock.
//! Every field is read and written only while the lock is held; no loop
//! observes a torn update.

use tokio::time::Instant;

use pulse_types::{unix_now_ms, Bundle, BundleHash, TxHash};

use crate::update::{ConfirmerUpdate, UpdateKind};

pub(crate) struct TaskState {
    /// True from task start until confirmation is observed.
    pub running: bool,
    /// Identity of the bundle under confirmation; fixed for the task.
    pub bundle_hash: BundleHash,
    /// Most recent attachment of the bundle.
    pub last_bundle: Bundle,
    /// Tail of `last_bundle` — the promotion and consistency target.
    pub next_tail_to_promote: TxHash,
    /// Past this instant, reattachment happens regardless of promotability.
    pub next_force_reattach_time: Instant,
    /// Promotion is suppressed before this instant.
    pub next_promo_time: Instant,
    /// Last known consistency verdict for the current tail, inverted.
    pub is_not_promotable: bool,
    pub num_attach: u64,
    pub num_promote: u64,
    pub total_pow_ms: u64,
    pub total_tipsel_ms: u64,
}

impl TaskState {
    pub fn start(
        bundle: Bundle,
        bundle_hash: BundleHash,
        tail_hash: TxHash,
        force_reattach_after: std::time::Duration,
    ) -> Self {
        let now = Instant::now();
        Self {
            running: true,
            bundle_hash,
            last_bundle: bundle,
            next_tail_to_promote: tail_hash,
            next_force_reattach_time: now + force_reattach_after,
            next_promo_time: now,
            is_not_promotable: false,
            num_attach: 0,
            num_promote: 0,
            total_pow_ms: 0,
            total_tipsel_ms: 0,
        }
    }

    /// Snapshot the counters into an update record. Called under the lock;
    /// the send happens after release.
    pub fn snapshot(
        &self,
        kind: UpdateKind,
        promoted_tail: Option<TxHash>,
        error: Option<String>,
    ) -> ConfirmerUpdate {
        ConfirmerUpdate {
            kind,
            num_attaches: self.num_attach,
            num_promotions: self.num_promote,
            total_pow_ms: self.total_pow_ms,
            total_tipsel_ms: self.total_tipsel_ms,
            timestamp_ms: unix_now_ms(),
            promoted_tail,
            error,
        }
    }
}

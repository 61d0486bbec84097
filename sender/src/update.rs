//! Sender updates — the published, enriched view of confirmer progress.

use serde::{Deserialize, Serialize};
use std::fmt;

use pulse_confirmer::UpdateKind;
use pulse_types::{Address, BundleHash};

/// Security level of issued transfers; fixes the transfer bundle size.
pub const SECURITY_LEVEL: u64 = 2;
/// Transactions per transfer bundle.
pub const BUNDLE_SIZE: u64 = SECURITY_LEVEL + 1;
/// Transactions per promotion bundle.
pub const PROMO_BUNDLE_SIZE: u64 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderUpdateKind {
    /// A new transfer entered confirmation.
    StartSend,
    /// An in-flight transfer was picked up and confirmation resumed.
    StartContinue,
    NoAction,
    Reattach,
    Promote,
    Confirm,
    Failed,
}

impl From<UpdateKind> for SenderUpdateKind {
    fn from(kind: UpdateKind) -> Self {
        match kind {
            UpdateKind::NoAction => Self::NoAction,
            UpdateKind::Reattach => Self::Reattach,
            UpdateKind::Promote => Self::Promote,
            UpdateKind::Confirm => Self::Confirm,
            UpdateKind::Failed => Self::Failed,
        }
    }
}

impl fmt::Display for SenderUpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::StartSend => "start send",
            Self::StartContinue => "start continue",
            Self::NoAction => "no action",
            Self::Reattach => "reattach",
            Self::Promote => "promote",
            Self::Confirm => "confirm",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// One published sender update. Counters are cumulative for the whole
/// transfer, including attachment work done before the confirmer took
/// over.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SenderUpdate {
    pub seq_uid: String,
    pub seq_name: String,
    pub kind: SenderUpdateKind,
    pub index: u64,
    pub addr: Address,
    pub bundle: BundleHash,
    /// Unix ms when the transfer entered confirmation.
    pub started_ms: u64,
    /// Unix ms of this update.
    pub update_ms: u64,
    pub num_attaches: u64,
    pub num_promotions: u64,
    pub promote_every_sec: u64,
    pub force_reattach_after_min: u64,
    pub promote_chain: bool,
    pub bundle_size: u64,
    pub promo_bundle_size: u64,
    pub total_pow_ms: u64,
    pub total_tipsel_ms: u64,
    /// Average proof-of-work per issued transaction, in milliseconds.
    pub avg_pow_per_tx_ms: u64,
    /// Transactions issued per second since the transfer started.
    pub tps: f32,
}

impl SenderUpdate {
    /// Transactions issued for this transfer so far.
    pub fn total_tx(&self) -> u64 {
        self.bundle_size * self.num_attaches + self.promo_bundle_size * self.num_promotions
    }

    /// Proof-of-work cost of the transfer: every transaction issued,
    /// weighted by bundle size. This is what the metrics export.
    pub fn pow_cost(&self) -> u64 {
        self.total_tx()
    }

    /// Fill the derived fields from the counters and timestamps.
    pub fn derive_stats(&mut self) {
        let total_tx = self.total_tx();
        self.avg_pow_per_tx_ms = if total_tx > 0 {
            self.total_pow_ms / total_tx
        } else {
            0
        };
        let elapsed_sec = self.update_ms.saturating_sub(self.started_ms) as f32 / 1000.0;
        self.tps = if elapsed_sec > 0.1 {
            total_tx as f32 / elapsed_sec
        } else {
            0.0
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(kind: SenderUpdateKind) -> SenderUpdate {
        SenderUpdate {
            seq_uid: "abc123".to_string(),
            seq_name: "seq".to_string(),
            kind,
            index: 0,
            addr: Address::all_nines(),
            bundle: BundleHash::all_nines(),
            started_ms: 10_000,
            update_ms: 20_000,
            num_attaches: 2,
            num_promotions: 3,
            promote_every_sec: 10,
            force_reattach_after_min: 15,
            promote_chain: false,
            bundle_size: BUNDLE_SIZE,
            promo_bundle_size: PROMO_BUNDLE_SIZE,
            total_pow_ms: 900,
            total_tipsel_ms: 100,
            avg_pow_per_tx_ms: 0,
            tps: 0.0,
        }
    }

    #[test]
    fn pow_cost_weights_bundle_sizes() {
        let upd = update(SenderUpdateKind::Confirm);
        // 2 attaches x 3 txs + 3 promotions x 1 tx
        assert_eq!(upd.pow_cost(), 9);
    }

    #[test]
    fn derive_stats_fills_average_and_rate() {
        let mut upd = update(SenderUpdateKind::Confirm);
        upd.derive_stats();
        assert_eq!(upd.avg_pow_per_tx_ms, 100);
        assert!((upd.tps - 0.9).abs() < 1e-6);
    }

    #[test]
    fn derive_stats_handles_zero_work() {
        let mut upd = update(SenderUpdateKind::StartSend);
        upd.num_attaches = 0;
        upd.num_promotions = 0;
        upd.update_ms = upd.started_ms;
        upd.derive_stats();
        assert_eq!(upd.avg_pow_per_tx_ms, 0);
        assert_eq!(upd.tps, 0.0);
    }

    #[test]
    fn confirmer_kinds_map_one_to_one() {
        assert_eq!(
            SenderUpdateKind::from(UpdateKind::NoAction),
            SenderUpdateKind::NoAction
        );
        assert_eq!(
            SenderUpdateKind::from(UpdateKind::Confirm),
            SenderUpdateKind::Confirm
        );
        assert_eq!(
            SenderUpdateKind::from(UpdateKind::Failed),
            SenderUpdateKind::Failed
        );
    }
}

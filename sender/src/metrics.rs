//! Prometheus metrics for confirmation sequences.
//!
//! The [`SenderMetrics`] struct owns a dedicated [`Registry`] the daemon
//! exposes in the Prometheus text exposition format. Gauges are labelled
//! by sequence UID and updated only on `confirm` updates.

use prometheus::{register_gauge_vec_with_registry, Encoder, GaugeVec, Opts, Registry, TextEncoder};

use crate::update::{SenderUpdate, SenderUpdateKind};

pub struct SenderMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,
    /// Seconds from sending start to confirmation, per sequence.
    pub confirmation_duration_sec: GaugeVec,
    /// Proof-of-work cost of the confirmed transfer: attaches x bundle
    /// size + promotions x promo bundle size.
    pub pow_cost: GaugeVec,
}

impl SenderMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let confirmation_duration_sec = register_gauge_vec_with_registry!(
            Opts::new(
                "pulse_confirmation_duration_sec",
                "Confirmation duration of the transfer"
            ),
            &["seqid"],
            registry
        )
        .expect("failed to register confirmation_duration_sec gauge");

        let pow_cost = register_gauge_vec_with_registry!(
            Opts::new(
                "pulse_pow_cost",
                "Proof-of-work done to confirm: attaches * bundle size + promotions * promo bundle size"
            ),
            &["seqid"],
            registry
        )
        .expect("failed to register pow_cost gauge");

        Self {
            registry,
            confirmation_duration_sec,
            pow_cost,
        }
    }

    /// Record a sender update. Non-confirm updates are ignored.
    pub fn update(&self, upd: &SenderUpdate) {
        if upd.kind != SenderUpdateKind::Confirm {
            return;
        }
        self.confirmation_duration_sec
            .with_label_values(&[&upd.seq_uid])
            .set(upd.update_ms.saturating_sub(upd.started_ms) as f64 / 1000.0);
        self.pow_cost
            .with_label_values(&[&upd.seq_uid])
            .set(upd.pow_cost() as f64);
    }

    /// Encode the registry in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .expect("failed to encode metrics");
        String::from_utf8(buf).expect("metrics exposition is UTF-8")
    }
}

impl Default for SenderMetrics {
    fn default() -> Self {
        Self::new()
    }
}

//! A named confirmation sequence.
//!
//! One sequence owns a bundle source and a confirmer. For every bundle the
//! source hands over it publishes a start update, runs the confirmation
//! task, folds the bundle's initial attachment cost into each confirmer
//! update, and publishes the enriched [`SenderUpdate`]s.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use pulse_confirmer::{Confirmer, ConfirmerParams};
use pulse_gateway::{ConsecutiveFailureCounter, DynGateway, ErrorCounter};
use pulse_types::{unix_now_ms, Address, BundleHash, Tag};

use crate::config::SequenceParams;
use crate::error::SenderError;
use crate::metrics::SenderMetrics;
use crate::source::{BundleSource, FirstBundle};
use crate::update::{SenderUpdate, SenderUpdateKind, BUNDLE_SIZE, PROMO_BUNDLE_SIZE};

/// The three gateway handles a sequence confirms through. The operations
/// have different latency profiles, so each may point at a different node.
#[derive(Clone)]
pub struct Gateways {
    /// Consistency checks and inclusion polling.
    pub gateway: DynGateway,
    /// Zero-value promotion attaches.
    pub promote_gateway: DynGateway,
    /// Full reattachments (tip selection + proof-of-work).
    pub reattach_gateway: DynGateway,
}

/// Cumulative work counters folded into a published update.
struct Totals {
    attaches: u64,
    promotions: u64,
    pow_ms: u64,
    tipsel_ms: u64,
}

pub struct Sequence {
    name: String,
    uid: String,
    params: SequenceParams,
    confirmer: Confirmer,
    source: BundleSource,
    metrics: Option<Arc<SenderMetrics>>,
    publish: Option<mpsc::Sender<SenderUpdate>>,
}

impl Sequence {
    pub fn new(
        name: impl Into<String>,
        params: SequenceParams,
        gateways: Gateways,
        source: BundleSource,
        metrics: Option<Arc<SenderMetrics>>,
        publish: Option<mpsc::Sender<SenderUpdate>>,
    ) -> Result<Self, SenderError> {
        let name = name.into();
        let confirmer = Confirmer::new(confirmer_params(&params, gateways)?);
        let uid = uid_for(&name);
        tracing::info!(seq = %name, uid = %uid, "created sequence");
        Ok(Self {
            name,
            uid,
            params,
            confirmer,
            source,
            metrics,
            publish,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Confirm bundles from the source until it closes.
    pub async fn run(mut self) {
        tracing::info!(seq = %self.name, "sequence started");
        while let Some(first) = self.source.recv().await {
            if let Err(err) = self.confirm_one(&first).await {
                tracing::error!(
                    seq = %self.name,
                    index = first.index,
                    "confirmation failed to start: {err}"
                );
            }
        }
        tracing::info!(seq = %self.name, "bundle source closed; sequence stopped");
    }

    async fn confirm_one(&mut self, first: &FirstBundle) -> Result<(), SenderError> {
        let bundle_hash = first.bundle.hash()?.clone();
        let started_ms = unix_now_ms();

        let start_kind = if first.is_new {
            SenderUpdateKind::StartSend
        } else {
            SenderUpdateKind::StartContinue
        };
        let start_update = self.build_update(
            start_kind,
            first,
            &bundle_hash,
            started_ms,
            started_ms,
            Totals {
                attaches: first.num_attach,
                promotions: 0,
                pow_ms: first.total_pow_ms,
                tipsel_ms: first.total_tipsel_ms,
            },
        );
        self.publish(start_update).await;

        let mut updates = self.confirmer.start_task(first.bundle.clone()).await?;
        while let Some(update) = updates.recv().await {
            if let Some(err) = &update.error {
                tracing::warn!(seq = %self.name, "confirmer reported an error: {err}");
            }
            // The transfer's counters include the attachment work done
            // before the confirmer took over.
            let merged = self.build_update(
                update.kind.into(),
                first,
                &bundle_hash,
                started_ms,
                update.timestamp_ms,
                Totals {
                    attaches: first.num_attach + update.num_attaches,
                    promotions: update.num_promotions,
                    pow_ms: first.total_pow_ms + update.total_pow_ms,
                    tipsel_ms: first.total_tipsel_ms + update.total_tipsel_ms,
                },
            );
            self.publish(merged).await;
        }
        Ok(())
    }

    fn build_update(
        &self,
        kind: SenderUpdateKind,
        first: &FirstBundle,
        bundle_hash: &BundleHash,
        started_ms: u64,
        update_ms: u64,
        totals: Totals,
    ) -> SenderUpdate {
        let mut update = SenderUpdate {
            seq_uid: self.uid.clone(),
            seq_name: self.name.clone(),
            kind,
            index: first.index,
            addr: first.addr.clone(),
            bundle: bundle_hash.clone(),
            started_ms,
            update_ms,
            num_attaches: totals.attaches,
            num_promotions: totals.promotions,
            promote_every_sec: self.params.promote_every_sec,
            force_reattach_after_min: self.params.force_reattach_after_min,
            promote_chain: self.params.promote_chain,
            bundle_size: BUNDLE_SIZE,
            promo_bundle_size: PROMO_BUNDLE_SIZE,
            total_pow_ms: totals.pow_ms,
            total_tipsel_ms: totals.tipsel_ms,
            avg_pow_per_tx_ms: 0,
            tps: 0.0,
        };
        update.derive_stats();
        update
    }

    async fn publish(&self, update: SenderUpdate) {
        tracing::info!(
            seq = %self.name,
            kind = %update.kind,
            index = update.index,
            attaches = update.num_attaches,
            promotions = update.num_promotions,
            "sender update"
        );
        if let Some(metrics) = &self.metrics {
            metrics.update(&update);
        }
        if let Some(publish) = &self.publish {
            let _ = publish.send(update).await;
        }
    }
}

fn confirmer_params(
    params: &SequenceParams,
    gateways: Gateways,
) -> Result<ConfirmerParams, SenderError> {
    let error_counter: Option<Arc<dyn ErrorCounter>> = if params.error_threshold > 0 {
        Some(Arc::new(ConsecutiveFailureCounter::new(
            params.error_threshold,
        )))
    } else {
        None
    };
    Ok(ConfirmerParams {
        gateway: gateways.gateway,
        promote_gateway: gateways.promote_gateway,
        reattach_gateway: gateways.reattach_gateway,
        promote_address: Address::new(params.promote_address.clone())?,
        promote_tag: Tag::new(params.promote_tag.clone())?,
        force_reattach_after: Duration::from_secs(params.force_reattach_after_min * 60),
        promote_every: Duration::from_secs(params.promote_every_sec),
        promote_disable: params.promote_disable,
        promote_chain: params.promote_chain,
        consistency_check_every: Duration::from_secs(params.consistency_check_sec),
        confirm_poll_every: Duration::from_secs(params.confirm_poll_sec),
        penalty_sleep: Duration::from_secs(params.penalty_sleep_sec),
        slowdown_threshold: params.slowdown_threshold,
        error_counter,
        solid_but_inconsistent: None,
    })
}

/// Stable sequence UID derived from the name.
fn uid_for(name: &str) -> String {
    let mut uid = hex::encode(name.as_bytes());
    uid.truncate(12);
    uid
}

//! The confirmation task: four loops, one lock, one update stream.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use pulse_gateway::{
    wait_until_confirmed, DynGateway, ErrorCounter, GatewayError, PermissiveCounter, Promotion,
};
use pulse_types::{Address, Bundle, BundleHash, Tag, TxHash};

use crate::cancel::CancelHandle;
use crate::error::ConfirmerError;
use crate::state::TaskState;
use crate::throttle::{self, LoopGuard};
use crate::update::{ConfirmerUpdate, UpdateKind};

/// Classifies gateway diagnostic text for a tip that is merely not yet
/// solid — such a tip is still promotable, not a consistency failure. The
/// diagnostic format is an external contract, so the predicate is
/// pluggable.
pub type SolidityPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Sleep between promote-loop iterations.
const PROMOTE_LOOP_SLEEP: Duration = Duration::from_secs(1);
/// Sleep between reattach-loop iterations.
const REATTACH_LOOP_SLEEP: Duration = Duration::from_secs(1);
/// Applied when [`ConfirmerParams::slowdown_threshold`] is zero.
const DEFAULT_SLOWDOWN_THRESHOLD: usize = 300;

/// Parameters of a [`Confirmer`]. Frozen for the lifetime of each task.
#[derive(Clone)]
pub struct ConfirmerParams {
    /// General node API: consistency checks and inclusion polling.
    pub gateway: DynGateway,
    /// Node handle for zero-value promotion attaches.
    pub promote_gateway: DynGateway,
    /// Node handle for full reattachments (tip selection + proof-of-work).
    pub reattach_gateway: DynGateway,
    /// Address carried by promotion bundles.
    pub promote_address: Address,
    /// Tag carried by promotion bundles.
    pub promote_tag: Tag,
    /// Past this interval without confirmation, reattach regardless of
    /// promotability.
    pub force_reattach_after: Duration,
    /// Minimum spacing between promotions.
    pub promote_every: Duration,
    /// When set, the promote loop is never started.
    pub promote_disable: bool,
    /// Reserved: chain promotions off the previous promotion instead of
    /// the original tail. Threaded through configuration, not yet acted on.
    pub promote_chain: bool,
    /// Base period of the promotability check (doubled under load).
    pub consistency_check_every: Duration,
    /// Inclusion polling period of the confirmation watcher.
    pub confirm_poll_every: Duration,
    /// Extra sleep after any failed gateway call.
    pub penalty_sleep: Duration,
    /// Active-loop count above which the promotability check slows down;
    /// zero selects the default of 300.
    pub slowdown_threshold: usize,
    /// Endpoint error accounting; defaults to a counter that never blocks.
    pub error_counter: Option<Arc<dyn ErrorCounter>>,
    /// Defaults to matching diagnostics that contain `"not solid"`.
    pub solid_but_inconsistent: Option<SolidityPredicate>,
}

/// Drives one bundle at a time to confirmation. Single-flight: starting a
/// second task while one is running fails with
/// [`ConfirmerError::AlreadyRunning`].
pub struct Confirmer {
    params: ConfirmerParams,
    state: Arc<Mutex<Option<TaskState>>>,
}

impl Confirmer {
    pub fn new(params: ConfirmerParams) -> Self {
        Self {
            params,
            state: Arc::new(Mutex::new(None)),
        }
    }

    /// Whether a task is active, and for which bundle.
    pub async fn is_running(&self) -> Option<BundleHash> {
        let guard = self.state.lock().await;
        guard
            .as_ref()
            .filter(|state| state.running)
            .map(|state| state.bundle_hash.clone())
    }

    /// Start the confirmation task for `bundle`.
    ///
    /// Returns the update stream. The stream yields one update per state
    /// transition and closes after the `confirm` update, once every worker
    /// loop has stopped. The channel holds a single update, so emission is
    /// consumer-paced: a stalled consumer stalls the task.
    pub async fn start_task(
        &self,
        bundle: Bundle,
    ) -> Result<mpsc::Receiver<ConfirmerUpdate>, ConfirmerError> {
        let tail = bundle.tail()?.clone();
        let bundle_hash = tail.bundle.clone();

        {
            let mut guard = self.state.lock().await;
            if guard.as_ref().is_some_and(|state| state.running) {
                return Err(ConfirmerError::AlreadyRunning);
            }
            *guard = Some(TaskState::start(
                bundle,
                bundle_hash.clone(),
                tail.hash.clone(),
                self.params.force_reattach_after,
            ));
        }

        let (update_tx, update_rx) = mpsc::channel(1);
        let shared = Arc::new(Shared {
            state: Arc::clone(&self.state),
            updates: update_tx,
            gateway: Arc::clone(&self.params.gateway),
            promote_gateway: Arc::clone(&self.params.promote_gateway),
            reattach_gateway: Arc::clone(&self.params.reattach_gateway),
            counter: self
                .params
                .error_counter
                .clone()
                .unwrap_or_else(|| Arc::new(PermissiveCounter)),
            promotion: Promotion {
                address: self.params.promote_address.clone(),
                tag: self.params.promote_tag.clone(),
            },
            promote_every: self.params.promote_every,
            force_reattach_after: self.params.force_reattach_after,
            consistency_check_every: self.params.consistency_check_every,
            confirm_poll_every: self.params.confirm_poll_every,
            penalty_sleep: self.params.penalty_sleep,
            slowdown_threshold: if self.params.slowdown_threshold == 0 {
                DEFAULT_SLOWDOWN_THRESHOLD
            } else {
                self.params.slowdown_threshold
            },
            solid_but_inconsistent: self
                .params
                .solid_but_inconsistent
                .clone()
                .unwrap_or_else(|| Arc::new(|info: &str| info.contains("not solid"))),
            bundle_hash,
        });

        let mut workers = Vec::with_capacity(3);

        let check_cancel = CancelHandle::new();
        workers.push(tokio::spawn(promotability_check_loop(
            Arc::clone(&shared),
            check_cancel.subscribe(),
        )));

        let promote_cancel = if self.params.promote_disable {
            tracing::debug!(
                bundle = %shared.bundle_hash,
                "promotion disabled; promote loop not started"
            );
            CancelHandle::noop()
        } else {
            let handle = CancelHandle::new();
            workers.push(tokio::spawn(promote_loop(
                Arc::clone(&shared),
                handle.subscribe(),
            )));
            handle
        };

        let reattach_cancel = CancelHandle::new();
        workers.push(tokio::spawn(reattach_loop(
            Arc::clone(&shared),
            reattach_cancel.subscribe(),
        )));

        // TODO: task-level timeout emitting a `failed` update; today a task
        // polls forever against a dead endpoint.
        tokio::spawn(watch_confirmation(
            shared,
            workers,
            [check_cancel, promote_cancel, reattach_cancel],
        ));

        Ok(update_rx)
    }
}

/// Everything the four loops share. The task state is only touched under
/// its lock; the lock is never held across a gateway call or a stream
/// send.
struct Shared {
    state: Arc<Mutex<Option<TaskState>>>,
    updates: mpsc::Sender<ConfirmerUpdate>,
    gateway: DynGateway,
    promote_gateway: DynGateway,
    reattach_gateway: DynGateway,
    counter: Arc<dyn ErrorCounter>,
    promotion: Promotion,
    promote_every: Duration,
    force_reattach_after: Duration,
    consistency_check_every: Duration,
    confirm_poll_every: Duration,
    penalty_sleep: Duration,
    slowdown_threshold: usize,
    solid_but_inconsistent: SolidityPredicate,
    bundle_hash: BundleHash,
}

impl Shared {
    /// Snapshot an update under the lock, send it after release.
    async fn emit(&self, kind: UpdateKind, promoted_tail: Option<TxHash>, error: Option<String>) {
        let update = {
            let guard = self.state.lock().await;
            guard
                .as_ref()
                .map(|state| state.snapshot(kind, promoted_tail, error))
        };
        if let Some(update) = update {
            let _ = self.updates.send(update).await;
        }
    }

    async fn still_running(&self) -> bool {
        let guard = self.state.lock().await;
        guard.as_ref().is_some_and(|state| state.running)
    }

    /// The tail currently targeted by promotion and consistency checks.
    async fn current_tail(&self) -> Option<TxHash> {
        let guard = self.state.lock().await;
        guard.as_ref().map(|state| state.next_tail_to_promote.clone())
    }

    async fn set_not_promotable(&self, value: bool) {
        let mut guard = self.state.lock().await;
        if let Some(state) = guard.as_mut() {
            state.is_not_promotable = value;
        }
    }

    /// Feed a call outcome to the error counter. A tripped verdict turns
    /// the error terminal for this call path.
    fn counted<T>(
        &self,
        endpoint: &str,
        result: Result<T, GatewayError>,
    ) -> Result<T, GatewayError> {
        let too_many = self.counter.check(endpoint, result.is_err());
        match result {
            Err(_) if too_many => Err(GatewayError::TooManyErrors {
                endpoint: endpoint.to_string(),
            }),
            other => other,
        }
    }

    async fn check_consistency(&self, tail: &TxHash) -> Result<bool, GatewayError> {
        let result = self.gateway.check_consistency(tail).await;
        let verdict = self.counted(self.gateway.endpoint(), result)?;
        let mut consistent = verdict.consistent;
        if !consistent && (self.solid_but_inconsistent)(&verdict.info) {
            consistent = true;
        }
        if !consistent {
            tracing::debug!(
                bundle = %self.bundle_hash,
                info = %verdict.info,
                "inconsistent tail"
            );
        }
        Ok(consistent)
    }

    /// One promote-loop work step. Skips silently while the tail is not
    /// promotable or the promotion pace has not elapsed.
    async fn promote_if_needed(&self) -> Result<(), GatewayError> {
        let tail = {
            let guard = self.state.lock().await;
            match guard.as_ref() {
                Some(state) if state.running => {
                    if state.is_not_promotable || Instant::now() < state.next_promo_time {
                        // idle until reattached or paced in
                        return Ok(());
                    }
                    state.next_tail_to_promote.clone()
                }
                _ => return Ok(()),
            }
        };

        let result = self.promote_gateway.attach(&tail, &self.promotion).await;
        match self.counted(self.promote_gateway.endpoint(), result) {
            Ok(attached) => {
                {
                    let mut guard = self.state.lock().await;
                    if let Some(state) = guard.as_mut() {
                        state.next_promo_time = Instant::now() + self.promote_every;
                        state.num_promote += 1;
                        state.total_pow_ms += attached.pow_ms;
                    }
                }
                tracing::debug!(bundle = %self.bundle_hash, tail = %tail, "promoted tail");
                self.emit(UpdateKind::Promote, Some(tail), None).await;
                Ok(())
            }
            Err(err) => {
                self.emit(UpdateKind::NoAction, None, Some(err.to_string()))
                    .await;
                Err(err)
            }
        }
    }

    /// One reattach-loop work step. Reattaches when the tail is not
    /// promotable or the force deadline has passed.
    async fn reattach_if_needed(&self) -> Result<(), GatewayError> {
        let bundle = {
            let guard = self.state.lock().await;
            match guard.as_ref() {
                Some(state) if state.running => {
                    if state.is_not_promotable
                        || Instant::now() > state.next_force_reattach_time
                    {
                        state.last_bundle.clone()
                    } else {
                        return Ok(());
                    }
                }
                _ => return Ok(()),
            }
        };

        let result = self.reattach_gateway.reattach(&bundle).await;
        match self.counted(self.reattach_gateway.endpoint(), result) {
            Ok(reattached) => {
                let new_tail = reattached.tail_hash.clone();
                {
                    let mut guard = self.state.lock().await;
                    if let Some(state) = guard.as_mut() {
                        state.last_bundle = reattached.bundle;
                        state.next_tail_to_promote = reattached.tail_hash;
                        state.is_not_promotable = false;
                        state.next_force_reattach_time =
                            Instant::now() + self.force_reattach_after;
                        state.num_attach += 1;
                        state.total_tipsel_ms += reattached.tipsel_ms;
                        state.total_pow_ms += reattached.pow_ms;
                    }
                }
                tracing::info!(
                    bundle = %self.bundle_hash,
                    tail = %new_tail,
                    "reattached bundle"
                );
                self.emit(UpdateKind::Reattach, None, None).await;
                Ok(())
            }
            Err(err) => {
                self.emit(UpdateKind::NoAction, None, Some(err.to_string()))
                    .await;
                Err(err)
            }
        }
    }
}

/// Periodically refreshes the shared promotability verdict from the
/// gateway. On a failed probe the stale verdict is kept.
async fn promotability_check_loop(shared: Arc<Shared>, mut cancel: broadcast::Receiver<()>) {
    let _guard = LoopGuard::enter();
    tracing::debug!(bundle = %shared.bundle_hash, "promotability check loop started");

    loop {
        let period =
            throttle::corrected_period(shared.consistency_check_every, shared.slowdown_threshold);
        tokio::select! {
            biased;
            _ = cancel.recv() => break,
            _ = tokio::time::sleep(period) => {}
        }
        if !shared.still_running().await {
            break;
        }

        let tail = match shared.current_tail().await {
            Some(tail) => tail,
            None => break,
        };
        match shared.check_consistency(&tail).await {
            Ok(consistent) => shared.set_not_promotable(!consistent).await,
            Err(err) => {
                tracing::error!(
                    bundle = %shared.bundle_hash,
                    "consistency check failed: {err}"
                );
                tokio::time::sleep(shared.penalty_sleep).await;
            }
        }
    }

    tracing::debug!(bundle = %shared.bundle_hash, "promotability check loop stopped");
}

/// Promotes the current tail on the configured pace, while promotable.
async fn promote_loop(shared: Arc<Shared>, mut cancel: broadcast::Receiver<()>) {
    let _guard = LoopGuard::enter();
    tracing::debug!(bundle = %shared.bundle_hash, "promote loop started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.recv() => break,
            _ = tokio::time::sleep(PROMOTE_LOOP_SLEEP) => {}
        }
        if !shared.still_running().await {
            break;
        }
        if let Err(err) = shared.promote_if_needed().await {
            tracing::error!(bundle = %shared.bundle_hash, "promotion failed: {err}");
            tokio::time::sleep(shared.penalty_sleep).await;
        }
    }

    tracing::debug!(bundle = %shared.bundle_hash, "promote loop stopped");
}

/// Reattaches the bundle when it stops being promotable or the force
/// deadline passes.
async fn reattach_loop(shared: Arc<Shared>, mut cancel: broadcast::Receiver<()>) {
    let _guard = LoopGuard::enter();
    tracing::debug!(bundle = %shared.bundle_hash, "reattach loop started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.recv() => break,
            _ = tokio::time::sleep(REATTACH_LOOP_SLEEP) => {}
        }
        if !shared.still_running().await {
            break;
        }
        if let Err(err) = shared.reattach_if_needed().await {
            tracing::error!(bundle = %shared.bundle_hash, "reattach failed: {err}");
            tokio::time::sleep(shared.penalty_sleep).await;
        }
    }

    tracing::debug!(bundle = %shared.bundle_hash, "reattach loop stopped");
}

/// Blocks until the bundle confirms, then tears the task down in order:
/// emit `confirm`, clear `running`, cancel the workers, wait for all of
/// them to exit, and only then let the update stream close.
async fn watch_confirmation(
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    cancels: [CancelHandle; 3],
) {
    tracing::debug!(bundle = %shared.bundle_hash, "confirmation watcher started");

    wait_until_confirmed(
        shared.gateway.as_ref(),
        &shared.counter,
        &shared.bundle_hash,
        shared.confirm_poll_every,
        shared.penalty_sleep,
    )
    .await;
    tracing::info!(bundle = %shared.bundle_hash, "bundle confirmed");

    shared.emit(UpdateKind::Confirm, None, None).await;
    {
        let mut guard = shared.state.lock().await;
        if let Some(state) = guard.as_mut() {
            state.running = false;
        }
    }
    for cancel in &cancels {
        cancel.cancel();
    }
    for worker in workers {
        let _ = worker.await;
    }

    tracing::debug!(
        bundle = %shared.bundle_hash,
        "worker loops stopped; update stream closing"
    );
}

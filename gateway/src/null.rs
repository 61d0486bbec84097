//! Nullable gateway — a scriptable in-memory node for deterministic tests.
//!
//! Records every call, synthesizes attachment results without touching the
//! network, and lets tests program consistency verdicts, confirmation
//! triggers, and failure injection.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use pulse_types::{Bundle, BundleHash, Transaction, TxHash};

use crate::error::GatewayError;
use crate::{Attached, Consistency, Gateway, Promotion, Reattached};

/// An in-memory [`Gateway`] with programmable behavior.
pub struct NullGateway {
    endpoint: String,
    inner: Mutex<NullState>,
}

#[derive(Default)]
struct NullState {
    confirmed: bool,
    confirm_after_promotions: Option<u64>,
    confirm_after_attaches: Option<u64>,
    /// Re-arming trigger: confirm every `n` promotions, then reset.
    confirm_every: Option<u64>,
    confirm_window_base: u64,
    /// Scripted consistency verdicts; the last entry repeats forever.
    consistency_script: VecDeque<(bool, String)>,
    fail_attaches: u32,
    fail_reattaches: u32,
    fail_consistency_checks: u32,
    fail_confirm_polls: u32,
    num_promotions: u64,
    num_attaches: u64,
    num_consistency_checks: u64,
    num_confirm_polls: u64,
    promoted_tails: Vec<TxHash>,
    next_hash: u64,
}

impl NullGateway {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            inner: Mutex::new(NullState::default()),
        }
    }

    /// Report the bundle confirmed on the next inclusion poll.
    pub fn confirm_now(&self) {
        self.lock().confirmed = true;
    }

    /// Report the bundle confirmed once `n` promotions have been attached.
    pub fn confirm_after_promotions(&self, n: u64) {
        self.lock().confirm_after_promotions = Some(n);
    }

    /// Report the bundle confirmed once `n` reattachments have been made.
    pub fn confirm_after_attaches(&self, n: u64) {
        self.lock().confirm_after_attaches = Some(n);
    }

    /// Report a confirmation every `n` promotions, re-arming afterwards.
    /// Lets a long-running demo loop confirm bundle after bundle.
    pub fn confirm_every_promotions(&self, n: u64) {
        self.lock().confirm_every = Some(n);
    }

    /// Queue a consistency verdict; the most recent one repeats forever.
    pub fn push_consistency(&self, consistent: bool, info: &str) {
        self.lock()
            .consistency_script
            .push_back((consistent, info.to_string()));
    }

    /// Fail the next `n` promotion attaches.
    pub fn fail_attaches(&self, n: u32) {
        self.lock().fail_attaches = n;
    }

    /// Fail the next `n` reattachments.
    pub fn fail_reattaches(&self, n: u32) {
        self.lock().fail_reattaches = n;
    }

    /// Fail the next `n` consistency checks.
    pub fn fail_consistency_checks(&self, n: u32) {
        self.lock().fail_consistency_checks = n;
    }

    /// Fail the next `n` inclusion polls.
    pub fn fail_confirm_polls(&self, n: u32) {
        self.lock().fail_confirm_polls = n;
    }

    pub fn promotions(&self) -> u64 {
        self.lock().num_promotions
    }

    pub fn attaches(&self) -> u64 {
        self.lock().num_attaches
    }

    pub fn consistency_checks(&self) -> u64 {
        self.lock().num_consistency_checks
    }

    pub fn confirm_polls(&self) -> u64 {
        self.lock().num_confirm_polls
    }

    /// Tails promoted so far, in call order.
    pub fn promoted_tails(&self) -> Vec<TxHash> {
        self.lock().promoted_tails.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NullState> {
        self.inner.lock().expect("null gateway lock poisoned")
    }

    fn unreachable(&self, reason: &str) -> GatewayError {
        GatewayError::Unreachable {
            endpoint: self.endpoint.clone(),
            reason: reason.to_string(),
        }
    }
}

impl NullState {
    /// Synthesize a fresh, unique transaction hash.
    fn synth_hash(&mut self) -> TxHash {
        const ALPHABET: &[u8] = b"9ABCDEFGHIJKLMNOPQRSTUVWXYZ";
        self.next_hash += 1;
        let mut s = String::with_capacity(81);
        let mut v = self.next_hash;
        for _ in 0..8 {
            s.push(ALPHABET[(v % 27) as usize] as char);
            v /= 27;
        }
        while s.len() < 81 {
            s.push('9');
        }
        TxHash::new(s).expect("synthesized hash is valid trytes")
    }

    fn maybe_confirm(&mut self) {
        if let Some(n) = self.confirm_after_promotions {
            if self.num_promotions >= n {
                self.confirmed = true;
            }
        }
        if let Some(n) = self.confirm_after_attaches {
            if self.num_attaches >= n {
                self.confirmed = true;
            }
        }
    }
}

#[async_trait]
impl Gateway for NullGateway {
    async fn attach(
        &self,
        tail: &TxHash,
        _promotion: &Promotion,
    ) -> Result<Attached, GatewayError> {
        let mut state = self.lock();
        if state.fail_attaches > 0 {
            state.fail_attaches -= 1;
            return Err(self.unreachable("injected attach failure"));
        }
        state.num_promotions += 1;
        state.promoted_tails.push(tail.clone());
        let tail_hash = state.synth_hash();
        state.maybe_confirm();
        Ok(Attached {
            tail_hash,
            pow_ms: 10,
        })
    }

    async fn reattach(&self, bundle: &Bundle) -> Result<Reattached, GatewayError> {
        let mut state = self.lock();
        if state.fail_reattaches > 0 {
            state.fail_reattaches -= 1;
            return Err(self.unreachable("injected reattach failure"));
        }
        state.num_attaches += 1;

        // Fresh attachment: same bundle hash, new transaction hashes.
        let transactions: Vec<Transaction> = bundle
            .transactions()
            .iter()
            .map(|tx| Transaction {
                hash: state.synth_hash(),
                ..tx.clone()
            })
            .collect();
        let tail_hash = transactions
            .iter()
            .find(|tx| tx.is_tail())
            .map(|tx| tx.hash.clone())
            .ok_or_else(|| GatewayError::InvalidResponse {
                endpoint: self.endpoint.clone(),
                reason: "bundle to reattach has no tail".to_string(),
            })?;
        state.maybe_confirm();
        Ok(Reattached {
            bundle: Bundle::new(transactions),
            tail_hash,
            tipsel_ms: 5,
            pow_ms: 20,
        })
    }

    async fn check_consistency(&self, _tail: &TxHash) -> Result<Consistency, GatewayError> {
        let mut state = self.lock();
        state.num_consistency_checks += 1;
        if state.fail_consistency_checks > 0 {
            state.fail_consistency_checks -= 1;
            return Err(self.unreachable("injected consistency failure"));
        }
        let (consistent, info) = if state.consistency_script.len() > 1 {
            state.consistency_script.pop_front().expect("len checked")
        } else {
            state
                .consistency_script
                .front()
                .cloned()
                .unwrap_or((true, String::new()))
        };
        Ok(Consistency { consistent, info })
    }

    async fn is_confirmed(&self, _bundle_hash: &BundleHash) -> Result<bool, GatewayError> {
        let mut state = self.lock();
        state.num_confirm_polls += 1;
        if state.fail_confirm_polls > 0 {
            state.fail_confirm_polls -= 1;
            return Err(self.unreachable("injected inclusion failure"));
        }
        if let Some(n) = state.confirm_every {
            if state.num_promotions - state.confirm_window_base >= n {
                state.confirm_window_base = state.num_promotions;
                return Ok(true);
            }
        }
        Ok(state.confirmed)
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_types::{Address, Tag, Trytes};

    fn bundle() -> Bundle {
        let bundle_hash = BundleHash::new("B".repeat(81)).expect("valid hash");
        Bundle::new(vec![Transaction {
            hash: TxHash::new("T".repeat(81)).expect("valid hash"),
            bundle: bundle_hash,
            current_index: 0,
            last_index: 0,
            trytes: Trytes::nines(27),
        }])
    }

    fn promotion() -> Promotion {
        Promotion {
            address: Address::all_nines(),
            tag: Tag::empty(),
        }
    }

    #[tokio::test]
    async fn attach_records_promoted_tail() {
        let gateway = NullGateway::new("null://a");
        let tail = TxHash::new("T".repeat(81)).expect("valid hash");
        let attached = gateway.attach(&tail, &promotion()).await.expect("attach");
        assert_ne!(attached.tail_hash, tail);
        assert_eq!(gateway.promotions(), 1);
        assert_eq!(gateway.promoted_tails(), vec![tail]);
    }

    #[tokio::test]
    async fn reattach_replaces_transaction_hashes() {
        let gateway = NullGateway::new("null://a");
        let original = bundle();
        let reattached = gateway.reattach(&original).await.expect("reattach");
        assert_eq!(reattached.bundle.len(), original.len());
        assert_eq!(
            reattached.bundle.hash().expect("valid"),
            original.hash().expect("valid")
        );
        assert_ne!(
            reattached.bundle.tail().expect("valid").hash,
            original.tail().expect("valid").hash
        );
        assert_eq!(reattached.tail_hash, reattached.bundle.tail().unwrap().hash);
    }

    #[tokio::test]
    async fn consistency_script_repeats_last_entry() {
        let gateway = NullGateway::new("null://a");
        gateway.push_consistency(false, "below max depth");
        gateway.push_consistency(true, "");
        let tail = TxHash::all_nines();

        let first = gateway.check_consistency(&tail).await.expect("check");
        assert!(!first.consistent);
        for _ in 0..3 {
            let verdict = gateway.check_consistency(&tail).await.expect("check");
            assert!(verdict.consistent);
        }
    }

    #[tokio::test]
    async fn confirms_after_scripted_promotions() {
        let gateway = NullGateway::new("null://a");
        gateway.confirm_after_promotions(2);
        let hash = BundleHash::all_nines();
        let tail = TxHash::all_nines();

        assert!(!gateway.is_confirmed(&hash).await.expect("poll"));
        gateway.attach(&tail, &promotion()).await.expect("attach");
        assert!(!gateway.is_confirmed(&hash).await.expect("poll"));
        gateway.attach(&tail, &promotion()).await.expect("attach");
        assert!(gateway.is_confirmed(&hash).await.expect("poll"));
    }

    #[tokio::test]
    async fn failure_injection_is_consumed() {
        let gateway = NullGateway::new("null://a");
        gateway.fail_attaches(1);
        let tail = TxHash::all_nines();

        assert!(gateway.attach(&tail, &promotion()).await.is_err());
        assert!(gateway.attach(&tail, &promotion()).await.is_ok());
    }
}

//! Ledger gateway capability.
//!
//! The confirmation machinery talks to tangle nodes exclusively through the
//! [`Gateway`] trait: zero-value promotion attaches, full reattachments
//! (tip selection + proof-of-work + resubmit), tip consistency checks, and
//! bundle inclusion queries. Implementations wrap a concrete node API
//! client; this crate ships only the capability surface, the endpoint
//! error counter, the confirmation polling primitive, and an in-memory
//! gateway for deterministic tests.

pub mod confirm;
pub mod counter;
pub mod error;
pub mod null;

use async_trait::async_trait;
use std::sync::Arc;

use pulse_types::{Address, Bundle, BundleHash, Tag, TxHash};

pub use confirm::wait_until_confirmed;
pub use counter::{ConsecutiveFailureCounter, ErrorCounter, PermissiveCounter};
pub use error::GatewayError;
pub use null::NullGateway;

/// Content of the zero-value bundle attached during a promotion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Promotion {
    pub address: Address,
    pub tag: Tag,
}

/// Result of a promotion attach.
#[derive(Clone, Debug)]
pub struct Attached {
    /// Tail hash of the freshly attached zero-value bundle.
    pub tail_hash: TxHash,
    /// Proof-of-work time spent by the node, in milliseconds.
    pub pow_ms: u64,
}

/// Result of a full reattachment.
#[derive(Clone, Debug)]
pub struct Reattached {
    /// The re-attached copy of the bundle (fresh transaction hashes).
    pub bundle: Bundle,
    /// Tail hash of the new attachment.
    pub tail_hash: TxHash,
    /// Tip-selection time, in milliseconds.
    pub tipsel_ms: u64,
    /// Proof-of-work time, in milliseconds.
    pub pow_ms: u64,
}

/// Verdict of a tip consistency check.
#[derive(Clone, Debug)]
pub struct Consistency {
    pub consistent: bool,
    /// Node-supplied diagnostic text; format is an external contract.
    pub info: String,
}

/// Capability interface onto a tangle node (or a set of nodes behind one
/// endpoint).
///
/// Calls are synchronous from the caller's perspective: an in-flight call
/// always completes or errors before the caller can observe anything else.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Attach a zero-value bundle referencing `tail`, inviting the network
    /// to select it.
    async fn attach(&self, tail: &TxHash, promotion: &Promotion) -> Result<Attached, GatewayError>;

    /// Re-run tip selection and proof-of-work for a fresh copy of `bundle`
    /// and resubmit it.
    async fn reattach(&self, bundle: &Bundle) -> Result<Reattached, GatewayError>;

    /// Whether `tail` is consistent (attachable) from this node's view.
    async fn check_consistency(&self, tail: &TxHash) -> Result<Consistency, GatewayError>;

    /// Whether any transaction of `bundle_hash` is reported confirmed.
    async fn is_confirmed(&self, bundle_hash: &BundleHash) -> Result<bool, GatewayError>;

    /// The endpoint identity reported to the error counter.
    fn endpoint(&self) -> &str;
}

/// Shared handle to a gateway implementation.
pub type DynGateway = Arc<dyn Gateway>;

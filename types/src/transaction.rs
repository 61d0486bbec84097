//! An attached tangle transaction, as returned by the attach step.

use serde::{Deserialize, Serialize};

use crate::hash::{BundleHash, TxHash};
use crate::trytes::Trytes;

/// One transaction of a bundle, with the attachment metadata the
/// confirmation machinery needs.
///
/// The transaction hash is computed by the ledger during proof-of-work and
/// attachment; it arrives here as data together with the raw trytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: TxHash,
    pub bundle: BundleHash,
    /// Position inside the bundle; the tail transaction has index 0.
    pub current_index: u64,
    /// Index of the last transaction in the bundle.
    pub last_index: u64,
    /// Raw serialized transaction trytes.
    pub trytes: Trytes,
}

impl Transaction {
    /// Whether this transaction is the bundle's tail.
    pub fn is_tail(&self) -> bool {
        self.current_index == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(index: u64) -> Transaction {
        Transaction {
            hash: TxHash::all_nines(),
            bundle: BundleHash::all_nines(),
            current_index: index,
            last_index: 3,
            trytes: Trytes::nines(27),
        }
    }

    #[test]
    fn only_index_zero_is_tail() {
        assert!(tx(0).is_tail());
        assert!(!tx(1).is_tail());
        assert!(!tx(3).is_tail());
    }
}

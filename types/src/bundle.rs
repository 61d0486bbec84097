//! Bundles — atomic ordered groups of transactions sharing one hash.

use serde::{Deserialize, Serialize};

use crate::error::TypesError;
use crate::hash::BundleHash;
use crate::transaction::Transaction;

/// An ordered group of transactions sharing one bundle hash, valid or
/// invalid on the ledger as a unit.
///
/// A reattachment produces a *new* bundle (fresh transaction hashes, same
/// semantic payload); the two share nothing beyond payload equivalence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    transactions: Vec<Transaction>,
}

impl Bundle {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self { transactions }
    }

    /// Extract the tail transaction (index 0) after validating the bundle:
    /// it must be non-empty and every transaction must carry the tail's
    /// bundle hash.
    pub fn tail(&self) -> Result<&Transaction, TypesError> {
        let tail = self
            .transactions
            .iter()
            .find(|tx| tx.is_tail())
            .ok_or(if self.transactions.is_empty() {
                TypesError::EmptyBundle
            } else {
                TypesError::MissingTail
            })?;
        for tx in &self.transactions {
            if tx.bundle != tail.bundle {
                return Err(TypesError::MixedBundleHashes(tx.current_index));
            }
        }
        Ok(tail)
    }

    /// The bundle hash, via the validated tail.
    pub fn hash(&self) -> Result<&BundleHash, TypesError> {
        self.tail().map(|tail| &tail.bundle)
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::TxHash;
    use crate::trytes::Trytes;

    fn hash_of(c: char) -> String {
        std::iter::repeat(c).take(81).collect()
    }

    fn tx(bundle: &BundleHash, index: u64, last: u64, hash_char: char) -> Transaction {
        Transaction {
            hash: TxHash::new(hash_of(hash_char)).expect("valid hash"),
            bundle: bundle.clone(),
            current_index: index,
            last_index: last,
            trytes: Trytes::nines(27),
        }
    }

    fn three_tx_bundle() -> Bundle {
        let bh = BundleHash::new(hash_of('B')).expect("valid hash");
        Bundle::new(vec![
            tx(&bh, 0, 2, 'T'),
            tx(&bh, 1, 2, 'U'),
            tx(&bh, 2, 2, 'V'),
        ])
    }

    #[test]
    fn tail_is_index_zero() {
        let bundle = three_tx_bundle();
        let tail = bundle.tail().expect("bundle has a tail");
        assert_eq!(tail.current_index, 0);
        assert_eq!(tail.hash.as_str(), hash_of('T'));
    }

    #[test]
    fn empty_bundle_has_no_tail() {
        let bundle = Bundle::new(vec![]);
        assert_eq!(bundle.tail().unwrap_err(), TypesError::EmptyBundle);
    }

    #[test]
    fn missing_index_zero_is_rejected() {
        let bh = BundleHash::new(hash_of('B')).expect("valid hash");
        let bundle = Bundle::new(vec![tx(&bh, 1, 2, 'U'), tx(&bh, 2, 2, 'V')]);
        assert_eq!(bundle.tail().unwrap_err(), TypesError::MissingTail);
    }

    #[test]
    fn mixed_bundle_hashes_rejected() {
        let bh = BundleHash::new(hash_of('B')).expect("valid hash");
        let other = BundleHash::new(hash_of('C')).expect("valid hash");
        let bundle = Bundle::new(vec![tx(&bh, 0, 1, 'T'), tx(&other, 1, 1, 'U')]);
        assert_eq!(bundle.tail().unwrap_err(), TypesError::MixedBundleHashes(1));
    }

    #[test]
    fn hash_comes_from_tail() {
        let bundle = three_tx_bundle();
        assert_eq!(bundle.hash().expect("valid bundle").as_str(), hash_of('B'));
    }
}

use proptest::prelude::*;

use pulse_types::{Bundle, BundleHash, Transaction, Trytes, TxHash, HASH_TRYTES_LEN};

/// Strategy producing valid tryte strings.
fn tryte_string(max_len: usize) -> impl Strategy<Value = String> {
    proptest::collection::vec(
        proptest::sample::select("9ABCDEFGHIJKLMNOPQRSTUVWXYZ".chars().collect::<Vec<_>>()),
        0..=max_len,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

/// Strategy producing valid 81-tryte hash strings.
fn hash_string() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        proptest::sample::select("9ABCDEFGHIJKLMNOPQRSTUVWXYZ".chars().collect::<Vec<_>>()),
        HASH_TRYTES_LEN,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

proptest! {
    /// Every string over the tryte alphabet is accepted and preserved.
    #[test]
    fn valid_trytes_always_accepted(s in tryte_string(200)) {
        let t = Trytes::new(s.clone()).expect("alphabet-only string");
        prop_assert_eq!(t.as_str(), s.as_str());
    }

    /// Any string containing a non-tryte character is rejected.
    #[test]
    fn invalid_char_always_rejected(
        prefix in tryte_string(20),
        bad in "[a-z0-8]",
        suffix in tryte_string(20),
    ) {
        let s = format!("{prefix}{bad}{suffix}");
        prop_assert!(Trytes::new(s).is_err());
    }

    /// Hash constructors accept exactly 81 trytes.
    #[test]
    fn hash_length_enforced(s in tryte_string(120)) {
        let ok = s.len() == HASH_TRYTES_LEN;
        prop_assert_eq!(TxHash::new(s).is_ok(), ok);
    }

    /// A well-formed bundle of any size always yields its index-0 tail.
    #[test]
    fn well_formed_bundle_has_tail(bundle_hash in hash_string(), size in 1u64..8) {
        let bh = BundleHash::new(bundle_hash).expect("valid hash");
        let txs = (0..size)
            .map(|i| {
                let mut h = "9".repeat(HASH_TRYTES_LEN);
                h.replace_range(..1, &"ABCDEFGH"[i as usize..i as usize + 1]);
                Transaction {
                    hash: TxHash::new(h).expect("valid hash"),
                    bundle: bh.clone(),
                    current_index: i,
                    last_index: size - 1,
                    trytes: Trytes::nines(27),
                }
            })
            .collect();
        let bundle = Bundle::new(txs);
        let tail = bundle.tail().expect("valid bundle");
        prop_assert_eq!(tail.current_index, 0);
        prop_assert_eq!(&tail.bundle, &bh);
    }
}

use proptest::prelude::*;

use crate::serialization::{Decode, Encode};

use super::Transaction;

proptest! {
    #[test]
    fn transaction_roundtrip(tx in Transaction::full_strategy()) {
        let bytes = tx.encode_to_vec();
        let decoded = Transaction::decode(bytes.as_slice())?;
        prop_assert_eq!(tx.id(), decoded.id());
        prop_assert_eq!(tx, decoded);
    }

    #[test]
    fn storage_proof_transaction_roundtrip(tx in Transaction::storage_proof_strategy()) {
        prop_assert!(tx.is_storage_proof_only());
        let bytes = tx.encode_to_vec();
        let decoded = Transaction::decode(bytes.as_slice())?;
        prop_assert_eq!(tx, decoded);
    }

    #[test]
    fn sig_hash_is_deterministic(tx in Transaction::minimal_strategy()) {
        prop_assert_eq!(tx.sig_hash(), tx.sig_hash());
    }
}

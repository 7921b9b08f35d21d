use proptest::prelude::*;

use crate::serialization::{Decode, Encode};

use super::arbitrary::{block_strategy, header_strategy};

proptest! {
    #[test]
    fn header_roundtrip(header in header_strategy()) {
        let bytes = header.encode_to_vec();
        let decoded = super::BlockHeader::decode(bytes.as_slice())?;
        prop_assert_eq!(header, decoded);
    }

    #[test]
    fn block_roundtrip(block in block_strategy()) {
        let bytes = block.encode_to_vec();
        let decoded = super::Block::decode(bytes.as_slice())?;
        prop_assert_eq!(block, decoded);
    }

    #[test]
    fn merkle_root_is_order_sensitive(block in block_strategy()) {
        let root = block.compute_merkle_root();
        let mut reversed = block.clone();
        reversed.transactions.reverse();
        if block.transactions.len() > 1 {
            prop_assert_ne!(root, reversed.compute_merkle_root());
        }
    }
}

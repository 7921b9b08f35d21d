//! `proptest` strategies for headers and blocks, used by both this
//! crate's round-trip tests and `uplo-consensus`'s validator tests.

use proptest::collection::vec;
use proptest::prelude::*;

use crate::ids::{BlockID, Hash};
use crate::outputs::MinerPayout;
use crate::primitives::Timestamp;
use crate::transaction::Transaction;

use super::{Block, BlockHeader};

pub fn header_strategy() -> impl Strategy<Value = BlockHeader> {
    (
        any::<[u8; 32]>(),
        any::<u64>(),
        any::<u64>(),
        any::<[u8; 32]>(),
    )
        .prop_map(|(parent, nonce, timestamp, merkle)| BlockHeader {
            parent_id: BlockID::from_bytes(parent),
            nonce,
            timestamp: Timestamp(timestamp),
            merkle_root: Hash(merkle),
        })
}

/// A block with a handful of transactions and payouts and a
/// (deliberately not recomputed) arbitrary merkle root; validator tests
/// that care about merkle correctness call `Block::compute_merkle_root`
/// themselves after generation.
pub fn block_strategy() -> impl Strategy<Value = Block> {
    (
        header_strategy(),
        vec(any::<MinerPayout>(), 0..3),
        vec(Transaction::minimal_strategy(), 0..3),
    )
        .prop_map(|(header, miner_payouts, transactions)| Block {
            header,
            miner_payouts,
            transactions,
        })
}

impl Arbitrary for MinerPayout {
    type Parameters = ();
    type Strategy = BoxedStrategy<MinerPayout>;

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        (any::<crate::currency::Currency>(), any::<[u8; 32]>())
            .prop_map(|(value, owner)| MinerPayout {
                value,
                owner: crate::ids::UnlockHash::from_bytes(owner),
            })
            .boxed()
    }
}

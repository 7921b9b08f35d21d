//! Shared `proptest` strategies, thin wrappers over the `Arbitrary` impls
//! `uplo-chain` carries behind its `proptest-impl` feature
//! (`block::arbitrary`, `transaction::arbitrary`, and the `CoinOutput`/
//! `ShareOutput` impls next to their type definitions), paralleling the
//! teacher's split between `zebra-chain`'s own `Arbitrary` impls and
//! `zebra-test`'s higher-level composed strategies.

use proptest::prelude::*;

use uplo_chain::currency::Currency;
use uplo_chain::ids::{BlockID, UnlockHash};
use uplo_chain::outputs::{CoinOutput, ShareOutput};
use uplo_chain::primitives::Timestamp;
use uplo_chain::{Block, BlockHeader};

pub fn currency() -> impl Strategy<Value = Currency> {
    any::<Currency>()
}

pub fn unlock_hash() -> impl Strategy<Value = UnlockHash> {
    any::<[u8; 32]>().prop_map(UnlockHash::from_bytes)
}

/// A class-A ("coin") unspent output.
pub fn unspent_coin_output() -> impl Strategy<Value = CoinOutput> {
    any::<CoinOutput>()
}

/// A class-B ("share") unspent output, always generated with a zero
/// `claimStart` — the only value a transaction is allowed to declare.
pub fn unspent_share_output() -> impl Strategy<Value = ShareOutput> {
    any::<ShareOutput>()
}

pub fn file_contract() -> impl Strategy<Value = uplo_chain::contract::FileContract> {
    any::<uplo_chain::contract::FileContract>()
}

/// A block naming `parent` as its parent, timestamped strictly after
/// `after`, with a handful of coin-transfer-only transactions and a
/// correctly recomputed Merkle root. The nonce is left at whatever
/// `proptest` draws — callers running under `NetworkParams::dev()`/
/// `testing()` get a root target easy enough that any nonce meets it, so
/// this needs no mining loop.
pub fn valid_child_block(parent: BlockID, after: u64) -> impl Strategy<Value = Block> {
    (
        any::<u64>(),
        1u64..1_000,
        proptest::collection::vec(uplo_chain::transaction::Transaction::minimal_strategy(), 0..3),
    )
        .prop_map(move |(nonce, offset, transactions)| {
            let mut block = Block {
                header: BlockHeader {
                    parent_id: parent,
                    nonce,
                    timestamp: Timestamp(after + offset),
                    merkle_root: uplo_chain::block::empty_merkle_root(),
                },
                miner_payouts: Vec::new(),
                transactions,
            };
            block.header.merkle_root = block.compute_merkle_root();
            block
        })
}

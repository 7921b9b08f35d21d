//! The genesis block: height 0, parent `Hash::default()`, no transactions.

use crate::block::{Block, BlockHeader};
use crate::ids::BlockID;
use crate::primitives::Timestamp;

use super::NetworkParams;

/// The hash used as a genesis block's (nonexistent) parent.
pub const GENESIS_PREVIOUS_BLOCK_ID: BlockID = BlockID(crate::ids::Hash([0u8; 32]));

/// Builds the genesis block for `params`. It carries no transactions and
/// no miner payouts; the initial coin and share allocations this system's
/// original chain would have encoded as a special coinbase are out of
/// scope for this engine (the caller seeds the store directly, see
/// `uplo-state`'s genesis-state constructor).
pub fn genesis_block(params: &NetworkParams) -> Block {
    let _ = params;
    let header = BlockHeader {
        parent_id: GENESIS_PREVIOUS_BLOCK_ID,
        nonce: 0,
        timestamp: Timestamp(0),
        merkle_root: crate::block::empty_merkle_root(),
    };
    Block {
        header,
        miner_payouts: Vec::new(),
        transactions: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_is_deterministic() {
        let params = NetworkParams::testing();
        let a = genesis_block(&params);
        let b = genesis_block(&params);
        assert_eq!(a.id(), b.id());
        assert_eq!(a.header.parent_id, GENESIS_PREVIOUS_BLOCK_ID);
    }
}

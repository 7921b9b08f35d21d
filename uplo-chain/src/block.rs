//! Blocks: a fixed 80-byte header plus miner payouts and transactions.

mod serialize;

#[cfg(any(test, feature = "proptest-impl"))]
pub mod arbitrary;

#[cfg(test)]
mod tests;

use crate::cached::Cached;
use crate::ids::{domain_hash, BlockID, Hash, TAG_UPLOCOIN_OUTPUT};
use crate::outputs::MinerPayout;
use crate::primitives::Timestamp;
use crate::transaction::Transaction;

pub use serialize::{HEADER_LEN, MAX_BLOCK_BYTES};

/// The 80-byte, wire-exact block header from spec §6.1:
/// `parentID(32) || nonce(8) || timestamp(8) || merkleRoot(32)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub parent_id: BlockID,
    pub nonce: u64,
    pub timestamp: Timestamp,
    pub merkle_root: Hash,
}

impl BlockHeader {
    /// A block's ID is the direct BLAKE2b-256 hash of its 80-byte header
    /// encoding — no domain tag, since the header format itself is
    /// already fixed-size and unambiguous (unlike transaction-derived
    /// IDs, which need a tag to separate different kinds of output).
    pub fn id(&self) -> BlockID {
        let bytes = serialize::header_encoding(self);
        let digest = blake2b_simd::Params::new().hash_length(32).hash(&bytes);
        let mut out = [0u8; 32];
        out.copy_from_slice(digest.as_bytes());
        BlockID::from_bytes(out)
    }

    /// Does this header's ID meet `target`?
    pub fn meets_target(&self, target: &crate::primitives::Target) -> bool {
        self.id().meets_target(&target.0)
    }
}

/// A fully assembled block: header plus the effects maintenance will
/// apply (miner payouts) plus the transactions that proposed state
/// changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub miner_payouts: Vec<MinerPayout>,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn id(&self) -> BlockID {
        self.header.id()
    }

    /// Recomputes the Merkle root over this block's miner payouts and
    /// transactions, in declaration order, using the same unbalanced
    /// binary tree convention as storage-proof segment verification
    /// (see `crypto::BinaryMerkleVerifier`).
    pub fn compute_merkle_root(&self) -> Hash {
        let mut leaves: Vec<Hash> = Vec::with_capacity(self.miner_payouts.len() + self.transactions.len());
        for payout in &self.miner_payouts {
            leaves.push(domain_hash(TAG_UPLOCOIN_OUTPUT, &payout_encoding(payout)));
        }
        for tx in &self.transactions {
            leaves.push(tx.id().0);
        }
        merkle_root_of(&leaves)
    }
}

fn payout_encoding(payout: &MinerPayout) -> Vec<u8> {
    use crate::serialization::Encode;
    payout.encode_to_vec()
}

/// Builds an unbalanced binary Merkle root over `leaves`' leaf hashes
/// (each already hashed with the 0x00 leaf prefix upstream via
/// `domain_hash`/`tx.id()`, so this only combines interior nodes).
pub fn merkle_root_of(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return empty_merkle_root();
    }
    let mut level: Vec<Hash> = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity((level.len() + 1) / 2);
        let mut iter = level.chunks(2);
        while let Some(pair) = iter.next() {
            if pair.len() == 2 {
                next.push(crate::ids::merkle_interior_hash(&pair[0], &pair[1]));
            } else {
                next.push(pair[0]);
            }
        }
        level = next;
    }
    level[0]
}

pub fn empty_merkle_root() -> Hash {
    crate::ids::merkle_leaf_hash(&[])
}

#[cfg(test)]
mod merkle_tests {
    use super::*;

    #[test]
    fn single_leaf_root_is_itself() {
        let leaf = Hash([7u8; 32]);
        assert_eq!(merkle_root_of(&[leaf]), leaf);
    }

    #[test]
    fn odd_leaf_is_promoted_unchanged() {
        let a = Hash([1u8; 32]);
        let b = Hash([2u8; 32]);
        let c = Hash([3u8; 32]);
        let root = merkle_root_of(&[a, b, c]);
        let ab = crate::ids::merkle_interior_hash(&a, &b);
        let expected = crate::ids::merkle_interior_hash(&ab, &c);
        assert_eq!(root, expected);
    }
}

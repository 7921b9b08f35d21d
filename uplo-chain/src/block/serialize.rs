//! Wire-exact header encoding and the variable-length block encoding
//! that wraps it.

use crate::ids::BlockID;
use crate::outputs::MinerPayout;
use crate::primitives::Timestamp;
use crate::serialization::{Decode, DecodeError, Encode};
use crate::transaction::Transaction;

use super::{Block, BlockHeader};

/// `parentID(32) || nonce(8) || timestamp(8) || merkleRoot(32)`, per §6.1.
pub const HEADER_LEN: usize = 32 + 8 + 8 + 32;

/// A hard decode-time cap on total block size. Distinct from
/// `NetworkParams::block_size_limit`, which is the consensus rule
/// enforced by the block validator — this is purely a DoS guard against
/// an adversarial stream claiming an enormous length prefix.
pub const MAX_BLOCK_BYTES: u64 = 32 * 1024 * 1024;

pub fn header_encoding(header: &BlockHeader) -> [u8; HEADER_LEN] {
    let mut out = [0u8; HEADER_LEN];
    out[0..32].copy_from_slice(header.parent_id.as_bytes());
    out[32..40].copy_from_slice(&header.nonce.to_le_bytes());
    out[40..48].copy_from_slice(&header.timestamp.0.to_le_bytes());
    out[48..80].copy_from_slice(header.merkle_root.as_bytes());
    out
}

impl Encode for BlockHeader {
    fn encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        target.write_all(&header_encoding(self))
    }
}

impl Decode for BlockHeader {
    fn decode<R: std::io::Read>(mut target: R) -> Result<BlockHeader, DecodeError> {
        let parent_id = BlockID::decode(&mut target)?;
        let nonce = u64::decode(&mut target)?;
        let timestamp = Timestamp(u64::decode(&mut target)?);
        let merkle_root = crate::ids::Hash::decode(&mut target)?;
        Ok(BlockHeader {
            parent_id,
            nonce,
            timestamp,
            merkle_root,
        })
    }
}

impl Encode for Block {
    fn encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.header.encode(&mut target)?;
        self.miner_payouts.encode(&mut target)?;
        self.transactions.encode(&mut target)
    }
}

impl Decode for Block {
    fn decode<R: std::io::Read>(target: R) -> Result<Block, DecodeError> {
        let mut limited = target.take(MAX_BLOCK_BYTES);
        let header = BlockHeader::decode(&mut limited)?;
        let miner_payouts = Vec::<MinerPayout>::decode(&mut limited)?;
        let transactions = Vec::<Transaction>::decode(&mut limited)?;
        Ok(Block {
            header,
            miner_payouts,
            transactions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Hash;

    #[test]
    fn header_roundtrips() {
        let header = BlockHeader {
            parent_id: BlockID::from_bytes([9u8; 32]),
            nonce: 42,
            timestamp: Timestamp(1_700_000_000),
            merkle_root: Hash([3u8; 32]),
        };
        let bytes = header.encode_to_vec();
        assert_eq!(bytes.len(), HEADER_LEN);
        let decoded = BlockHeader::decode(bytes.as_slice()).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn empty_block_roundtrips() {
        let block = Block {
            header: BlockHeader {
                parent_id: BlockID::from_bytes([0u8; 32]),
                nonce: 0,
                timestamp: Timestamp(0),
                merkle_root: super::super::empty_merkle_root(),
            },
            miner_payouts: Vec::new(),
            transactions: Vec::new(),
        };
        let bytes = block.encode_to_vec();
        let decoded = Block::decode(bytes.as_slice()).unwrap();
        assert_eq!(block, decoded);
    }
}

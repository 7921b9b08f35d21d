//! Derivation of the IDs an applied transaction or block assigns to the
//! entities it creates.
//!
//! Every one of these is the same shape: hash a domain tag together with
//! some canonical bytes that name the creating context (a transaction's
//! no-signatures encoding, a contract ID, a block ID) plus an index, so
//! that two outputs created by the same context never collide. None of
//! this lives behind a trait — like the rest of [`crate::ids`], it is a
//! fixed part of the codec.

use crate::ids::{
    domain_hash, BlockID, ContractID, Hash, OutputID, TAG_CLAIM_OUTPUT, TAG_FILE_CONTRACT,
    TAG_FOUNDATION, TAG_MINER_PAYOUT, TAG_UPLOCOIN_OUTPUT, TAG_UPLOFUND_OUTPUT,
};

fn with_index(base: &[u8], index: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(base.len() + 8);
    out.extend_from_slice(base);
    out.extend_from_slice(&index.to_le_bytes());
    out
}

/// ID of a transaction's `index`-th coin output.
pub fn coin_output_id(no_signatures_encoding: &[u8], index: u64) -> OutputID {
    domain_hash(TAG_UPLOCOIN_OUTPUT, &with_index(no_signatures_encoding, index)).into()
}

/// ID of a transaction's `index`-th share output.
pub fn share_output_id(no_signatures_encoding: &[u8], index: u64) -> OutputID {
    domain_hash(TAG_UPLOFUND_OUTPUT, &with_index(no_signatures_encoding, index)).into()
}

/// ID of a transaction's `index`-th file contract.
pub fn contract_id(no_signatures_encoding: &[u8], index: u64) -> ContractID {
    domain_hash(TAG_FILE_CONTRACT, &with_index(no_signatures_encoding, index)).into()
}

/// ID of the delayed claim a transaction's `index`-th share input
/// generates when it is spent.
pub fn claim_output_id(txid: Hash, share_input_index: u64) -> OutputID {
    domain_hash(TAG_CLAIM_OUTPUT, &with_index(txid.as_bytes(), share_input_index)).into()
}

/// ID of a resolved contract's `index`-th valid-proof output.
pub fn contract_valid_output_id(contract: ContractID, index: u64) -> OutputID {
    let mut base = contract.as_bytes().to_vec();
    base.push(0);
    domain_hash(TAG_FILE_CONTRACT, &with_index(&base, index)).into()
}

/// ID of a resolved contract's `index`-th missed-proof output.
pub fn contract_missed_output_id(contract: ContractID, index: u64) -> OutputID {
    let mut base = contract.as_bytes().to_vec();
    base.push(1);
    domain_hash(TAG_FILE_CONTRACT, &with_index(&base, index)).into()
}

/// ID of a block's `index`-th miner payout.
pub fn miner_payout_id(block: BlockID, index: u64) -> OutputID {
    domain_hash(TAG_MINER_PAYOUT, &with_index(block.as_bytes(), index)).into()
}

/// ID of the foundation subsidy output emitted by a block, per spec
/// §4.8: `id = Hash(blockID || foundationTag)`.
pub fn foundation_subsidy_id(block: BlockID) -> OutputID {
    domain_hash(TAG_FOUNDATION, block.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn differing_indices_never_collide() {
        let base = b"some no-signatures encoding";
        let a = coin_output_id(base, 0);
        let b = coin_output_id(base, 1);
        assert_ne!(a, b);
    }

    #[test]
    fn differing_tags_never_collide_on_the_same_bytes() {
        let base = b"same bytes either way";
        assert_ne!(coin_output_id(base, 0), share_output_id(base, 0));
    }

    #[test]
    fn valid_and_missed_outputs_of_the_same_contract_differ() {
        let contract = ContractID::from_bytes([7u8; 32]);
        assert_ne!(
            contract_valid_output_id(contract, 0),
            contract_missed_output_id(contract, 0)
        );
    }
}

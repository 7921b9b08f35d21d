//! Transactions: the unit of state-transition proposal.
//!
//! A transaction's ID and `SigHash` are both derived from its
//! **no-signatures** encoding — the same fields as the full encoding,
//! minus the `signatures` list. This keeps signatures from affecting IDs,
//! which matters because transactions within the same block may spend
//! each other's outputs by ID before the block (and thus every
//! transaction's final signature set) is finished being assembled.

mod serialize;

#[cfg(any(test, feature = "proptest-impl"))]
mod arbitrary;

#[cfg(test)]
mod tests;

use crate::cached::Cached;
use crate::contract::{FileContract, FileContractRevision, StorageProof};
use crate::currency::Currency;
use crate::ids::{ContractID, OutputID, TransactionID};
use crate::outputs::{CoinInput, CoinOutput, ShareInput, ShareOutput};
use crate::unlock::TransactionSignature;

pub use serialize::MAX_TX_SIZE;

#[derive(Clone, Debug)]
pub struct Transaction {
    pub coin_inputs: Vec<CoinInput>,
    pub coin_outputs: Vec<CoinOutput>,
    pub share_inputs: Vec<ShareInput>,
    pub share_outputs: Vec<ShareOutput>,
    pub file_contracts: Vec<FileContract>,
    pub file_contract_revisions: Vec<FileContractRevision>,
    pub storage_proofs: Vec<StorageProof>,
    pub miner_fees: Vec<Currency>,
    pub arbitrary_data: Vec<Vec<u8>>,
    pub signatures: Vec<TransactionSignature>,

    id: Cached<TransactionID>,
}

impl Transaction {
    pub fn new(
        coin_inputs: Vec<CoinInput>,
        coin_outputs: Vec<CoinOutput>,
        share_inputs: Vec<ShareInput>,
        share_outputs: Vec<ShareOutput>,
        file_contracts: Vec<FileContract>,
        file_contract_revisions: Vec<FileContractRevision>,
        storage_proofs: Vec<StorageProof>,
        miner_fees: Vec<Currency>,
        arbitrary_data: Vec<Vec<u8>>,
        signatures: Vec<TransactionSignature>,
    ) -> Transaction {
        let mut tx = Transaction {
            coin_inputs,
            coin_outputs,
            share_inputs,
            share_outputs,
            file_contracts,
            file_contract_revisions,
            storage_proofs,
            miner_fees,
            arbitrary_data,
            signatures,
            id: Cached::new(),
        };
        let id = tx.compute_id();
        tx.id = Cached::from(id);
        tx
    }

    /// A transaction consisting solely of a storage proof (per
    /// `standalone_valid`'s rule that storage proofs are solitary in their
    /// creation effects).
    pub fn is_storage_proof_only(&self) -> bool {
        !self.storage_proofs.is_empty()
            && self.coin_outputs.is_empty()
            && self.share_outputs.is_empty()
            && self.file_contracts.is_empty()
            && self.file_contract_revisions.is_empty()
    }

    pub fn fee_sum(&self) -> Currency {
        self.miner_fees.iter().cloned().sum()
    }

    pub fn id(&self) -> TransactionID {
        self.id.value().unwrap_or_else(|| self.compute_id())
    }

    fn compute_id(&self) -> TransactionID {
        let bytes = serialize::no_signatures_encoding(self);
        crate::ids::domain_hash(crate::ids::TAG_UPLOCOIN_INPUT, &bytes).into()
    }

    /// The message every [`TransactionSignature`] in this transaction
    /// signs (absent any field-narrowing from `covered_fields`, which the
    /// validator applies separately).
    pub fn sig_hash(&self) -> crate::ids::Hash {
        let no_sig = serialize::no_signatures_encoding(self);
        crate::unlock::sig_hash(&no_sig, &self.id())
    }

    /// ID this transaction's `index`-th coin output will be created
    /// under, were it applied.
    pub fn coin_output_id(&self, index: usize) -> OutputID {
        crate::derive::coin_output_id(&serialize::no_signatures_encoding(self), index as u64)
    }

    /// ID this transaction's `index`-th share output will be created
    /// under, were it applied.
    pub fn share_output_id(&self, index: usize) -> OutputID {
        crate::derive::share_output_id(&serialize::no_signatures_encoding(self), index as u64)
    }

    /// ID this transaction's `index`-th file contract will be created
    /// under, were it applied.
    pub fn contract_id(&self, index: usize) -> ContractID {
        crate::derive::contract_id(&serialize::no_signatures_encoding(self), index as u64)
    }

    /// ID of the delayed claim output this transaction's `index`-th share
    /// input generates when spent.
    pub fn claim_output_id(&self, share_input_index: usize) -> OutputID {
        crate::derive::claim_output_id(self.id().0, share_input_index as u64)
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.coin_inputs == other.coin_inputs
            && self.coin_outputs == other.coin_outputs
            && self.share_inputs == other.share_inputs
            && self.share_outputs == other.share_outputs
            && self.file_contracts == other.file_contracts
            && self.file_contract_revisions == other.file_contract_revisions
            && self.storage_proofs == other.storage_proofs
            && self.miner_fees == other.miner_fees
            && self.arbitrary_data == other.arbitrary_data
            && self.signatures == other.signatures
    }
}

impl Eq for Transaction {}

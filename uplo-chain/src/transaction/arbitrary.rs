//! `proptest` strategies for transactions and their components.

use proptest::collection::vec;
use proptest::prelude::*;

use crate::contract::{FileContract, FileContractRevision, StorageProof};
use crate::currency::Currency;
use crate::ids::{ContractID, Hash, OutputID, UnlockHash};
use crate::outputs::{CoinInput, CoinOutput, ShareInput, ShareOutput};
use crate::unlock::{CoveredFields, PublicKeyBytes, TransactionSignature, UnlockConditions};

use super::Transaction;

fn unlock_hash_strategy() -> impl Strategy<Value = UnlockHash> {
    any::<[u8; 32]>().prop_map(UnlockHash::from_bytes)
}

fn output_id_strategy() -> impl Strategy<Value = OutputID> {
    any::<[u8; 32]>().prop_map(OutputID::from_bytes)
}

fn contract_id_strategy() -> impl Strategy<Value = ContractID> {
    any::<[u8; 32]>().prop_map(ContractID::from_bytes)
}

fn hash_strategy() -> impl Strategy<Value = Hash> {
    any::<[u8; 32]>().prop_map(Hash)
}

fn unlock_conditions_strategy() -> impl Strategy<Value = UnlockConditions> {
    (
        any::<u64>(),
        vec(any::<[u8; 32]>().prop_map(PublicKeyBytes), 1..3),
        1u64..2,
    )
        .prop_map(|(timelock, public_keys, signatures_required)| UnlockConditions {
            timelock,
            public_keys,
            signatures_required,
        })
}

fn coin_input_strategy() -> impl Strategy<Value = CoinInput> {
    (output_id_strategy(), unlock_conditions_strategy()).prop_map(|(parent_id, unlock_conditions)| {
        CoinInput {
            parent_id,
            unlock_conditions,
        }
    })
}

fn coin_output_strategy() -> impl Strategy<Value = CoinOutput> {
    (any::<Currency>(), unlock_hash_strategy())
        .prop_filter("coin outputs are never zero-valued", |(value, _)| !value.is_zero())
        .prop_map(|(value, owner)| CoinOutput { value, owner })
}

fn share_input_strategy() -> impl Strategy<Value = ShareInput> {
    (
        output_id_strategy(),
        unlock_conditions_strategy(),
        unlock_hash_strategy(),
    )
        .prop_map(|(parent_id, unlock_conditions, claim_unlock_hash)| ShareInput {
            parent_id,
            unlock_conditions,
            claim_unlock_hash,
        })
}

fn share_output_strategy() -> impl Strategy<Value = ShareOutput> {
    (any::<Currency>(), unlock_hash_strategy())
        .prop_filter("share outputs are never zero-valued", |(value, _)| !value.is_zero())
        .prop_map(|(value, owner)| ShareOutput {
            value,
            owner,
            // claimStart is set by the engine at apply time; the
            // standalone-validity rule requires it to be zero in the
            // transaction body.
            claim_start: Currency::zero(),
        })
}

fn coin_outputs_strategy(n: impl Into<proptest::collection::SizeRange>) -> impl Strategy<Value = Vec<CoinOutput>> {
    vec(coin_output_strategy(), n)
}

fn file_contract_strategy() -> impl Strategy<Value = FileContract> {
    (
        any::<u64>(),
        hash_strategy(),
        1u64..1000,
        coin_outputs_strategy(1..3),
        unlock_hash_strategy(),
        any::<u64>(),
    )
        .prop_map(
            |(file_size, merkle_root, window_len, valid_outputs, owner, revision_number)| {
                let payout: Currency = valid_outputs.iter().map(|o| o.value.clone()).sum();
                FileContract {
                    file_size,
                    merkle_root,
                    window_start: 1,
                    window_end: 1 + window_len,
                    payout,
                    missed_outputs: valid_outputs.clone(),
                    valid_outputs,
                    owner,
                    revision_number,
                }
            },
        )
}

fn file_contract_revision_strategy() -> impl Strategy<Value = FileContractRevision> {
    (
        contract_id_strategy(),
        unlock_conditions_strategy(),
        any::<u64>(),
        hash_strategy(),
        coin_outputs_strategy(1..3),
        unlock_hash_strategy(),
    )
        .prop_map(
            |(parent_id, unlock_conditions, new_file_size, new_merkle_root, outputs, new_owner)| {
                FileContractRevision {
                    parent_id,
                    unlock_conditions,
                    new_revision_number: 1,
                    new_file_size,
                    new_merkle_root,
                    new_window_start: 1,
                    new_window_end: 1000,
                    new_missed_outputs: outputs.clone(),
                    new_valid_outputs: outputs,
                    new_owner,
                }
            },
        )
}

fn storage_proof_strategy() -> impl Strategy<Value = StorageProof> {
    (contract_id_strategy(), vec(any::<u8>(), 0..64), vec(hash_strategy(), 0..4)).prop_map(
        |(parent_id, segment, proof)| StorageProof {
            parent_id,
            segment,
            proof,
        },
    )
}

fn signature_strategy() -> impl Strategy<Value = TransactionSignature> {
    (output_id_strategy(), any::<u64>(), any::<[u8; 64]>()).prop_map(
        |(input_id, public_key_index, signature)| TransactionSignature {
            input_id,
            public_key_index,
            covered_fields: CoveredFields::WholeTransaction,
            signature: crate::unlock::SignatureBytes(signature),
        },
    )
}

impl Transaction {
    /// A coin-transfer-only transaction: no shares, contracts, or proofs.
    /// Used by block-level proptests that don't care about exercising
    /// every branch of the validator.
    pub fn minimal_strategy() -> impl Strategy<Value = Transaction> {
        (
            vec(coin_input_strategy(), 0..3),
            coin_outputs_strategy(0..3),
            vec(any::<Currency>(), 0..2),
            vec(signature_strategy(), 0..3),
        )
            .prop_map(|(coin_inputs, coin_outputs, miner_fees, signatures)| {
                Transaction::new(
                    coin_inputs,
                    coin_outputs,
                    Vec::new(),
                    Vec::new(),
                    Vec::new(),
                    Vec::new(),
                    Vec::new(),
                    miner_fees,
                    Vec::new(),
                    signatures,
                )
            })
    }

    /// A transaction exercising every module: coin and share moves, a new
    /// contract, a revision, and (independently) a storage-proof-only
    /// transaction, composed by the caller as needed.
    pub fn full_strategy() -> impl Strategy<Value = Transaction> {
        (
            vec(coin_input_strategy(), 0..2),
            coin_outputs_strategy(0..2),
            vec(share_input_strategy(), 0..2),
            vec(share_output_strategy(), 0..2),
            vec(file_contract_strategy(), 0..1),
            vec(file_contract_revision_strategy(), 0..1),
            vec(any::<Currency>(), 0..2),
            vec(signature_strategy(), 0..2),
        )
            .prop_map(
                |(
                    coin_inputs,
                    coin_outputs,
                    share_inputs,
                    share_outputs,
                    file_contracts,
                    file_contract_revisions,
                    miner_fees,
                    signatures,
                )| {
                    Transaction::new(
                        coin_inputs,
                        coin_outputs,
                        share_inputs,
                        share_outputs,
                        file_contracts,
                        file_contract_revisions,
                        Vec::new(),
                        miner_fees,
                        Vec::new(),
                        signatures,
                    )
                },
            )
    }

    /// A storage-proof-only transaction, respecting the standalone-valid
    /// rule that such a transaction carries no other creation effects.
    pub fn storage_proof_strategy() -> impl Strategy<Value = Transaction> {
        storage_proof_strategy().prop_map(|proof| {
            Transaction::new(
                Vec::new(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
                vec![proof],
                Vec::new(),
                Vec::new(),
                Vec::new(),
            )
        })
    }
}

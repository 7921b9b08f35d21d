//! Standalone transaction validation (spec §4.4, `standalone_valid`):
//! every check that needs nothing but the transaction itself, the height
//! it is being considered at, and the network's constants. No store
//! lookup happens here — that's [`super::stateful`].

use std::collections::HashSet;
use std::convert::TryFrom;

use uplo_chain::crypto::SignatureScheme;
use uplo_chain::governance::GOVERNANCE_UPDATE_TAG;
use uplo_chain::ids::OutputID;
use uplo_chain::parameters::NetworkParams;
use uplo_chain::primitives::BlockHeight;
use uplo_chain::serialization::Encode;
use uplo_chain::transaction::Transaction;
use uplo_chain::unlock::{CoveredFields, UnlockConditions};

use crate::error::TransactionError;

/// Builds the exact byte string a [`uplo_chain::unlock::TransactionSignature`]
/// signs, honoring its declared `covered_fields`: either every field (the
/// same bytes `Transaction::sig_hash` would hash) or a hand-picked subset
/// of each field vector by index, kept in the transaction's own
/// declaration order.
fn covered_message(tx: &Transaction, covered: &CoveredFields) -> Vec<u8> {
    let mut out = Vec::new();
    match covered {
        CoveredFields::WholeTransaction => {
            tx.coin_inputs.encode(&mut out).expect("vec encode is infallible");
            tx.coin_outputs.encode(&mut out).expect("vec encode is infallible");
            tx.share_inputs.encode(&mut out).expect("vec encode is infallible");
            tx.share_outputs.encode(&mut out).expect("vec encode is infallible");
            tx.file_contracts.encode(&mut out).expect("vec encode is infallible");
            tx.file_contract_revisions
                .encode(&mut out)
                .expect("vec encode is infallible");
            tx.storage_proofs.encode(&mut out).expect("vec encode is infallible");
            tx.miner_fees.encode(&mut out).expect("vec encode is infallible");
            tx.arbitrary_data.encode(&mut out).expect("vec encode is infallible");
        }
        CoveredFields::Explicit {
            coin_inputs,
            coin_outputs,
            share_inputs,
            share_outputs,
            contracts,
            revisions,
            storage_proofs,
            miner_fees,
            arbitrary_data,
        } => {
            encode_selected(&mut out, &tx.coin_inputs, coin_inputs);
            encode_selected(&mut out, &tx.coin_outputs, coin_outputs);
            encode_selected(&mut out, &tx.share_inputs, share_inputs);
            encode_selected(&mut out, &tx.share_outputs, share_outputs);
            encode_selected(&mut out, &tx.file_contracts, contracts);
            encode_selected(&mut out, &tx.file_contract_revisions, revisions);
            encode_selected(&mut out, &tx.storage_proofs, storage_proofs);
            encode_selected(&mut out, &tx.miner_fees, miner_fees);
            encode_selected(&mut out, &tx.arbitrary_data, arbitrary_data);
        }
    }
    out
}

fn encode_selected<T: Encode>(out: &mut Vec<u8>, items: &[T], indices: &[u64]) {
    let selected: Vec<&T> = indices
        .iter()
        .filter_map(|&i| items.get(i as usize))
        .collect();
    (selected.len() as u64)
        .encode(&mut *out)
        .expect("vec encode is infallible");
    for item in selected {
        item.encode(&mut *out).expect("vec encode is infallible");
    }
}

/// Every `(output_id, unlock_conditions)` an input spends. A
/// [`uplo_chain::unlock::TransactionSignature`] names the `OutputID` of the
/// output its input spends, not a positional index, so coin and share
/// inputs are addressed the same way here.
fn all_inputs(tx: &Transaction) -> Vec<(OutputID, &UnlockConditions)> {
    let mut out = Vec::with_capacity(tx.coin_inputs.len() + tx.share_inputs.len());
    for input in &tx.coin_inputs {
        out.push((input.parent_id, &input.unlock_conditions));
    }
    for input in &tx.share_inputs {
        out.push((input.parent_id, &input.unlock_conditions));
    }
    out
}

fn check_no_double_spend(tx: &Transaction) -> Result<(), TransactionError> {
    let mut seen = HashSet::new();
    for (id, _) in all_inputs(tx) {
        if !seen.insert(id) {
            return Err(TransactionError::DoubleSpend(id));
        }
    }

    let mut seen_proofs = HashSet::new();
    for proof in &tx.storage_proofs {
        if !seen_proofs.insert(proof.parent_id) {
            return Err(TransactionError::DuplicateStorageProof(proof.parent_id));
        }
    }

    Ok(())
}

fn check_size(tx: &Transaction, height: BlockHeight, params: &NetworkParams) -> Result<(), TransactionError> {
    let size = tx.encode_to_vec().len() as u64;
    if size > params.block_size_limit {
        return Err(TransactionError::TxTooLarge {
            actual: size,
            limit: params.block_size_limit,
        });
    }
    // The post-hardfork per-transaction cap rides on the same activation
    // height as the ASIC nonce-divisibility rule: both are part of the
    // same size/throughput-tightening hardfork in this chain's history.
    if height.0 >= params.asic_hardfork_height.0 && size > params.tx_size_limit_post_hardfork {
        return Err(TransactionError::TxTooLarge {
            actual: size,
            limit: params.tx_size_limit_post_hardfork,
        });
    }
    Ok(())
}

fn check_storage_proof_solitary(tx: &Transaction) -> Result<(), TransactionError> {
    if !tx.storage_proofs.is_empty() && !tx.is_storage_proof_only() {
        return Err(TransactionError::StorageProofWithOutputs);
    }
    Ok(())
}

fn check_contracts(tx: &Transaction, height: BlockHeight, params: &NetworkParams) -> Result<(), TransactionError> {
    for (index, contract) in tx.file_contracts.iter().enumerate() {
        if !(contract.window_start > height.0 && contract.window_end > contract.window_start) {
            return Err(TransactionError::WindowViolation {
                window_start: BlockHeight(contract.window_start),
                window_end: BlockHeight(contract.window_end),
                height,
            });
        }
        let expected = params.post_tax(&contract.payout, height);
        if contract.valid_proof_sum() != expected || contract.missed_proof_sum() != expected {
            return Err(TransactionError::OutputSumMismatch(tx.contract_id(index)));
        }
    }
    Ok(())
}

fn check_revisions(tx: &Transaction, height: BlockHeight) -> Result<(), TransactionError> {
    for revision in &tx.file_contract_revisions {
        if !(revision.new_window_start > height.0 && revision.new_window_end > revision.new_window_start) {
            return Err(TransactionError::WindowViolation {
                window_start: BlockHeight(revision.new_window_start),
                window_end: BlockHeight(revision.new_window_end),
                height,
            });
        }
        let valid_sum: uplo_chain::currency::Currency =
            revision.new_valid_outputs.iter().map(|o| o.value.clone()).sum();
        let missed_sum: uplo_chain::currency::Currency =
            revision.new_missed_outputs.iter().map(|o| o.value.clone()).sum();
        if valid_sum != missed_sum {
            return Err(TransactionError::OutputSumMismatch(revision.parent_id));
        }
    }
    Ok(())
}

fn check_zero_values(tx: &Transaction, height: BlockHeight, params: &NetworkParams) -> Result<(), TransactionError> {
    if params.zero_outputs_allowed(height) {
        return Ok(());
    }
    for (index, output) in tx.coin_outputs.iter().enumerate() {
        if output.value.is_zero() {
            return Err(TransactionError::ZeroOutput(tx.coin_output_id(index)));
        }
    }
    for (index, output) in tx.share_outputs.iter().enumerate() {
        if output.value.is_zero() {
            return Err(TransactionError::ZeroOutput(tx.share_output_id(index)));
        }
        if !output.claim_start.is_zero() {
            return Err(TransactionError::NonZeroClaimStart(tx.share_output_id(index)));
        }
    }
    for fee in &tx.miner_fees {
        if fee.is_zero() {
            return Err(TransactionError::ZeroMinerFee);
        }
    }
    Ok(())
}

fn check_timelocks(tx: &Transaction, height: BlockHeight) -> Result<(), TransactionError> {
    for (id, conditions) in all_inputs(tx) {
        if conditions.timelock > height.0 {
            return Err(TransactionError::TimelockNotSatisfied(id, BlockHeight(conditions.timelock)));
        }
    }
    Ok(())
}

fn check_signatures(tx: &Transaction, scheme: &dyn SignatureScheme) -> Result<(), TransactionError> {
    let storage_proof_only = tx.is_storage_proof_only();
    let txid = tx.id();
    let inputs = all_inputs(tx);

    // Every distinct public-key index a signature vouched for, per input.
    let mut satisfied: std::collections::HashMap<OutputID, HashSet<u64>> = std::collections::HashMap::new();

    for signature in &tx.signatures {
        if storage_proof_only && !matches!(signature.covered_fields, CoveredFields::WholeTransaction) {
            return Err(TransactionError::SignatureFailure(signature.input_id));
        }

        let (_, conditions) = inputs
            .iter()
            .find(|(id, _)| *id == signature.input_id)
            .ok_or(TransactionError::SignatureFailure(signature.input_id))?;

        let key_bytes = conditions
            .public_keys
            .get(signature.public_key_index as usize)
            .ok_or(TransactionError::SignatureFailure(signature.input_id))?;

        let public_key = uplo_chain::crypto::PublicKey::try_from(*key_bytes)
            .map_err(|_| TransactionError::SignatureFailure(signature.input_id))?;
        let sig = uplo_chain::crypto::Signature::try_from(&signature.signature)
            .map_err(|_| TransactionError::SignatureFailure(signature.input_id))?;

        let message_bytes = covered_message(tx, &signature.covered_fields);
        let message = uplo_chain::unlock::sig_hash(&message_bytes, &txid);

        if !scheme.verify(&public_key, message.as_bytes(), &sig) {
            return Err(TransactionError::SignatureFailure(signature.input_id));
        }

        satisfied
            .entry(signature.input_id)
            .or_insert_with(HashSet::new)
            .insert(signature.public_key_index);
    }

    for (id, conditions) in inputs {
        let have = satisfied.get(&id).map(|s| s.len() as u64).unwrap_or(0);
        if have < conditions.signatures_required {
            return Err(TransactionError::SignatureFailure(id));
        }
    }

    Ok(())
}

fn check_governance_updates(tx: &Transaction, height: BlockHeight, params: &NetworkParams) -> Result<(), TransactionError> {
    if height.0 < params.governance_hardfork_height.0 {
        return Ok(());
    }
    for entry in &tx.arbitrary_data {
        let tagged = entry.len() >= 16 && entry[..16] == GOVERNANCE_UPDATE_TAG;
        if tagged && uplo_chain::governance::parse_governance_update(entry).is_none() {
            return Err(TransactionError::InvalidGovernanceUpdate);
        }
    }
    Ok(())
}

/// All checks a transaction must pass independent of any store lookup
/// (spec §4.4). Ordering mirrors the spec's own listing; the first
/// failing check's error is returned.
pub fn standalone_valid(
    tx: &Transaction,
    height: BlockHeight,
    params: &NetworkParams,
    scheme: &dyn SignatureScheme,
) -> Result<(), TransactionError> {
    check_size(tx, height, params)?;
    check_storage_proof_solitary(tx)?;
    check_no_double_spend(tx)?;
    check_contracts(tx, height, params)?;
    check_revisions(tx, height)?;
    check_zero_values(tx, height, params)?;
    check_timelocks(tx, height)?;
    check_signatures(tx, scheme)?;
    check_governance_updates(tx, height, params)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::Signer;
    use uplo_chain::crypto::Ed25519Scheme;
    use uplo_chain::currency::Currency;
    use uplo_chain::outputs::{CoinInput, CoinOutput};
    use uplo_chain::unlock::{PublicKeyBytes, SignatureBytes, TransactionSignature};

    fn signed_transfer() -> Transaction {
        let mut csprng = rand_core::OsRng;
        let keypair = ed25519_dalek::Keypair::generate(&mut csprng);
        let conditions = UnlockConditions {
            timelock: 0,
            public_keys: vec![PublicKeyBytes::from(keypair.public)],
            signatures_required: 1,
        };
        let parent_id = OutputID::from_bytes([9u8; 32]);
        let input = CoinInput {
            parent_id,
            unlock_conditions: conditions,
        };
        let output = CoinOutput {
            value: Currency::from_u64(10),
            owner: uplo_chain::ids::UnlockHash::from_bytes([1u8; 32]),
        };
        let unsigned = Transaction::new(
            vec![input],
            vec![output],
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            vec![Currency::from_u64(1)],
            Vec::new(),
            Vec::new(),
        );
        let digest = unsigned.sig_hash();
        let sig = keypair.sign(digest.as_bytes());

        Transaction::new(
            unsigned.coin_inputs.clone(),
            unsigned.coin_outputs.clone(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            unsigned.miner_fees.clone(),
            Vec::new(),
            vec![TransactionSignature {
                input_id: parent_id,
                public_key_index: 0,
                covered_fields: CoveredFields::WholeTransaction,
                signature: SignatureBytes::from(sig),
            }],
        )
    }

    #[test]
    fn accepts_a_validly_signed_transfer() {
        let params = NetworkParams::testing();
        let tx = signed_transfer();
        assert!(standalone_valid(&tx, BlockHeight(1), &params, &Ed25519Scheme).is_ok());
    }

    #[test]
    fn rejects_a_double_spend_within_one_transaction() {
        let params = NetworkParams::testing();
        let conditions = UnlockConditions {
            timelock: 0,
            public_keys: vec![],
            signatures_required: 0,
        };
        let parent_id = OutputID::from_bytes([1u8; 32]);
        let input = CoinInput {
            parent_id,
            unlock_conditions: conditions,
        };
        let tx = Transaction::new(
            vec![input.clone(), input],
            vec![CoinOutput {
                value: Currency::from_u64(1),
                owner: uplo_chain::ids::UnlockHash::from_bytes([2u8; 32]),
            }],
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );
        let result = standalone_valid(&tx, BlockHeight(1), &params, &Ed25519Scheme);
        assert!(matches!(result, Err(TransactionError::DoubleSpend(_))));
    }

    #[test]
    fn rejects_a_zero_valued_miner_fee() {
        let params = NetworkParams::testing();
        let tx = Transaction::new(
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            vec![Currency::zero()],
            Vec::new(),
            Vec::new(),
        );
        let result = standalone_valid(&tx, BlockHeight(1), &params, &Ed25519Scheme);
        assert!(matches!(result, Err(TransactionError::ZeroMinerFee)));
    }

    #[test]
    fn rejects_a_zero_miner_fee_even_when_another_fee_in_the_same_transaction_is_nonzero() {
        let params = NetworkParams::testing();
        let tx = Transaction::new(
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            vec![Currency::zero(), Currency::from_u64(5)],
            Vec::new(),
            Vec::new(),
        );
        let result = standalone_valid(&tx, BlockHeight(1), &params, &Ed25519Scheme);
        assert!(matches!(result, Err(TransactionError::ZeroMinerFee)));
    }
}

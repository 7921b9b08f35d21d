//! Store-dependent transaction validation (spec §4.4, `stateful_valid`):
//! existence, ownership, and storage-proof checks that need a view onto
//! the current (in-progress) block application.

use uplo_chain::contract::{segment_index, SEGMENT_SIZE};
use uplo_chain::crypto::MerkleVerifier;
use uplo_chain::currency::Currency;
use uplo_chain::ids::{BlockID, ContractID, OutputID};
use uplo_chain::outputs::{CoinOutput, ShareOutput};
use uplo_chain::primitives::BlockHeight;
use uplo_chain::transaction::Transaction;

use crate::error::TransactionError;

/// A read-only view of chain state as seen while applying one block's
/// transactions in order: later transactions in the same block may spend
/// outputs created by earlier ones, so this is not simply the previous
/// block's committed store — see [`crate::block::apply`].
pub trait TransactionView {
    fn get_coin_output(&self, id: OutputID) -> Option<CoinOutput>;
    fn get_share_output(&self, id: OutputID) -> Option<ShareOutput>;
    fn get_contract(&self, id: ContractID) -> Option<uplo_chain::contract::FileContract>;
    /// The block ID at `height` on the path this view is built against.
    /// Used to recompute a storage proof's required segment.
    fn block_id_at(&self, height: BlockHeight) -> Option<BlockID>;
}

fn check_inputs(tx: &Transaction, view: &dyn TransactionView) -> Result<(), TransactionError> {
    for input in &tx.coin_inputs {
        let output = view
            .get_coin_output(input.parent_id)
            .ok_or(TransactionError::MissingOutput(input.parent_id))?;
        if input.unlock_conditions.unlock_hash() != output.owner {
            return Err(TransactionError::WrongUnlockConditions(input.parent_id));
        }
    }
    for input in &tx.share_inputs {
        let output = view
            .get_share_output(input.parent_id)
            .ok_or(TransactionError::MissingOutput(input.parent_id))?;
        if input.unlock_conditions.unlock_hash() != output.owner {
            return Err(TransactionError::WrongUnlockConditions(input.parent_id));
        }
    }
    Ok(())
}

/// Per-asset-class value conservation (spec §4.4 invariant 2): what a
/// transaction spends must equal what it creates, asset class by asset
/// class. Revisions mutate an existing contract's payout split in place
/// and move no coins or shares of their own, so they play no part here.
fn check_balance(tx: &Transaction, view: &dyn TransactionView) -> Result<(), TransactionError> {
    let mut coins_in = Currency::zero();
    for input in &tx.coin_inputs {
        let output = view
            .get_coin_output(input.parent_id)
            .ok_or(TransactionError::MissingOutput(input.parent_id))?;
        coins_in = coins_in + output.value;
    }
    let coins_out: Currency = tx.coin_outputs.iter().map(|o| o.value.clone()).sum::<Currency>()
        + tx.miner_fees.iter().cloned().sum::<Currency>()
        + tx.file_contracts.iter().map(|c| c.payout.clone()).sum::<Currency>();
    if coins_in != coins_out {
        return Err(TransactionError::CoinsNotConserved(tx.id()));
    }

    let mut shares_in = Currency::zero();
    for input in &tx.share_inputs {
        let output = view
            .get_share_output(input.parent_id)
            .ok_or(TransactionError::MissingOutput(input.parent_id))?;
        shares_in = shares_in + output.value;
    }
    let shares_out: Currency = tx.share_outputs.iter().map(|o| o.value.clone()).sum();
    if shares_in != shares_out {
        return Err(TransactionError::SharesNotConserved(tx.id()));
    }

    Ok(())
}

fn check_revisions(tx: &Transaction, view: &dyn TransactionView) -> Result<(), TransactionError> {
    for revision in &tx.file_contract_revisions {
        let contract = view
            .get_contract(revision.parent_id)
            .ok_or(TransactionError::MissingContract(revision.parent_id))?;
        if revision.new_revision_number <= contract.revision_number {
            return Err(TransactionError::RevisionNumberNotIncreasing(revision.parent_id));
        }
        if revision.unlock_conditions.unlock_hash() != contract.owner {
            return Err(TransactionError::RevisionUnlockMismatch(revision.parent_id));
        }
        let new_sum: uplo_chain::currency::Currency = revision
            .new_valid_outputs
            .iter()
            .map(|o| o.value.clone())
            .sum();
        if new_sum != contract.valid_proof_sum() {
            return Err(TransactionError::OutputSumMismatch(revision.parent_id));
        }
    }
    Ok(())
}

fn check_storage_proofs(
    tx: &Transaction,
    height: BlockHeight,
    view: &dyn TransactionView,
    merkle: &dyn MerkleVerifier,
) -> Result<(), TransactionError> {
    for proof in &tx.storage_proofs {
        let contract = view
            .get_contract(proof.parent_id)
            .ok_or(TransactionError::MissingContract(proof.parent_id))?;

        if !(height.0 >= contract.window_start && height.0 <= contract.window_end) {
            return Err(TransactionError::WindowViolation {
                window_start: BlockHeight(contract.window_start),
                window_end: BlockHeight(contract.window_end),
                height,
            });
        }

        let block_at_start = view
            .block_id_at(BlockHeight(contract.window_start))
            .ok_or(TransactionError::BadStorageProof(proof.parent_id))?;

        let (index, size) = segment_index(proof.parent_id, block_at_start, contract.file_size, SEGMENT_SIZE);
        if proof.segment.len() as u64 != size {
            return Err(TransactionError::BadStorageProof(proof.parent_id));
        }
        let num_leaves = if contract.file_size == 0 {
            0
        } else {
            (contract.file_size + SEGMENT_SIZE - 1) / SEGMENT_SIZE
        };
        // The segment is exactly `SEGMENT_SIZE` (= 32) bytes, the width of
        // a `Hash`, except for a short final segment, which is zero-padded
        // to match how the uploader's own tree was built.
        let mut leaf_bytes = [0u8; 32];
        leaf_bytes[..proof.segment.len()].copy_from_slice(&proof.segment);
        let leaf = uplo_chain::ids::Hash(leaf_bytes);
        if !merkle.verify(leaf, &proof.proof, index, num_leaves, contract.merkle_root) {
            return Err(TransactionError::BadStorageProof(proof.parent_id));
        }
    }
    Ok(())
}

/// All checks a transaction must pass that require a view onto chain
/// state (spec §4.4). `standalone_valid` must already have been checked
/// for the same transaction before calling this.
pub fn stateful_valid(
    tx: &Transaction,
    height: BlockHeight,
    view: &dyn TransactionView,
    merkle: &dyn MerkleVerifier,
) -> Result<(), TransactionError> {
    check_inputs(tx, view)?;
    check_balance(tx, view)?;
    check_revisions(tx, view)?;
    check_storage_proofs(tx, height, view, merkle)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use uplo_chain::ids::UnlockHash;
    use uplo_chain::outputs::CoinInput;
    use uplo_chain::unlock::UnlockConditions;

    #[derive(Default)]
    struct FakeView {
        coins: HashMap<OutputID, CoinOutput>,
    }

    impl TransactionView for FakeView {
        fn get_coin_output(&self, id: OutputID) -> Option<CoinOutput> {
            self.coins.get(&id).cloned()
        }
        fn get_share_output(&self, _id: OutputID) -> Option<ShareOutput> {
            None
        }
        fn get_contract(&self, _id: ContractID) -> Option<uplo_chain::contract::FileContract> {
            None
        }
        fn block_id_at(&self, _height: BlockHeight) -> Option<BlockID> {
            None
        }
    }

    fn open_conditions() -> UnlockConditions {
        UnlockConditions {
            timelock: 0,
            public_keys: Vec::new(),
            signatures_required: 0,
        }
    }

    fn spend_tx(parent_id: OutputID, output_value: u64) -> Transaction {
        Transaction::new(
            vec![CoinInput {
                parent_id,
                unlock_conditions: open_conditions(),
            }],
            vec![CoinOutput {
                value: Currency::from_u64(output_value),
                owner: UnlockHash::from_bytes([2u8; 32]),
            }],
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
        )
    }

    #[test]
    fn accepts_a_transaction_whose_output_equals_its_spent_input() {
        let parent_id = OutputID::from_bytes([9u8; 32]);
        let mut view = FakeView::default();
        view.coins.insert(
            parent_id,
            CoinOutput {
                value: Currency::from_u64(10),
                owner: UnlockHash::from_bytes([0u8; 32]),
            },
        );
        let tx = spend_tx(parent_id, 10);
        assert!(check_balance(&tx, &view).is_ok());
    }

    #[test]
    fn rejects_a_transaction_that_mints_coins_its_inputs_never_carried() {
        let parent_id = OutputID::from_bytes([9u8; 32]);
        let mut view = FakeView::default();
        view.coins.insert(
            parent_id,
            CoinOutput {
                value: Currency::from_u64(10),
                owner: UnlockHash::from_bytes([0u8; 32]),
            },
        );
        let tx = spend_tx(parent_id, 20);
        assert!(matches!(
            check_balance(&tx, &view),
            Err(TransactionError::CoinsNotConserved(_))
        ));
    }
}

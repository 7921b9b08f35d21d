//! Transaction application and the per-block maintenance pass (spec
//! §4.5): turns a block that has already passed [`super::check::block_valid`]
//! and [`crate::transaction::stateful_valid`] into the [`Diff`] list that
//! represents its effect on the store.

use uplo_chain::contract::FileContract;
use uplo_chain::currency::Currency;
use uplo_chain::derive;
use uplo_chain::ids::{BlockID, ContractID, Hash, OutputID};
use uplo_chain::outputs::{CoinOutput, ShareOutput};
use uplo_chain::parameters::NetworkParams;
use uplo_chain::primitives::BlockHeight;
use uplo_chain::transaction::Transaction;
use uplo_chain::Block;

use uplo_state::diff::{commit_diff, Diff, Direction};
use uplo_state::WriteTransaction;

use crate::error::ApplyError;
use crate::governance;
use crate::transaction::stateful::TransactionView;

/// A read-only view of a [`WriteTransaction`] in progress, implementing
/// [`TransactionView`] so `stateful_valid` sees every output and contract
/// earlier transactions *in this same block* have already created —
/// `get_*` reads straight through to the transaction, which is mutated in
/// place as each of its own transactions is applied in turn.
pub struct BlockView<'a> {
    txn: &'a dyn WriteTransaction,
}

impl<'a> BlockView<'a> {
    pub fn new(txn: &'a dyn WriteTransaction) -> BlockView<'a> {
        BlockView { txn }
    }
}

impl<'a> TransactionView for BlockView<'a> {
    fn get_coin_output(&self, id: OutputID) -> Option<CoinOutput> {
        self.txn.get_coin_output(id)
    }

    fn get_share_output(&self, id: OutputID) -> Option<ShareOutput> {
        self.txn.get_share_output(id)
    }

    fn get_contract(&self, id: ContractID) -> Option<FileContract> {
        self.txn.get_contract(id)
    }

    fn block_id_at(&self, height: BlockHeight) -> Option<BlockID> {
        self.txn.path_at(height)
    }
}

/// What applying one block produced: its diffs (to be stored on the
/// block's [`uplo_state::StoredBlock`] record for future revert/replay)
/// and the consistency checksum taken once every diff has been committed.
pub struct AppliedBlock {
    pub diffs: Vec<Diff>,
    pub checksum: Hash,
    /// The governance pair as it stood *before* this block, if this
    /// block rotated it — the snapshot `StoredBlock::governance_snapshot`
    /// carries for O(1) revert.
    pub governance_snapshot: Option<uplo_chain::governance::GovernancePair>,
}

fn commit(
    txn: &mut dyn WriteTransaction,
    diff: Diff,
    diffs: &mut Vec<Diff>,
) -> Result<(), ApplyError> {
    commit_diff(txn, &diff, Direction::Apply)?;
    diffs.push(diff);
    Ok(())
}

/// Applies one transaction's effects against `txn`, in the order spec
/// §4.5 lists: coin inputs/outputs, share inputs/outputs, contracts,
/// revisions, storage proofs. By the time this runs, `tx` has already
/// passed `standalone_valid` and `stateful_valid` against the view built
/// from `txn` at its current (in-progress) state, so every precondition
/// here is expected to hold — a [`uplo_state::StoreError`] surfacing
/// anyway means the store disagrees with the validator, i.e. corruption.
fn apply_transaction(
    txn: &mut dyn WriteTransaction,
    tx: &Transaction,
    height: BlockHeight,
    params: &NetworkParams,
    diffs: &mut Vec<Diff>,
) -> Result<(), ApplyError> {
    for input in &tx.coin_inputs {
        let output = txn
            .get_coin_output(input.parent_id)
            .ok_or(crate::error::ConsensusError::Corruption(
                "coin input references a missing output during apply",
            ))?;
        commit(
            txn,
            Diff::CoinOutput {
                id: input.parent_id,
                output,
                direction: Direction::Revert,
            },
            diffs,
        )?;
    }
    for (index, output) in tx.coin_outputs.iter().enumerate() {
        let id = tx.coin_output_id(index);
        commit(
            txn,
            Diff::CoinOutput {
                id,
                output: output.clone(),
                direction: Direction::Apply,
            },
            diffs,
        )?;
    }

    for (index, input) in tx.share_inputs.iter().enumerate() {
        let existing =
            txn.get_share_output(input.parent_id)
                .ok_or(crate::error::ConsensusError::Corruption(
                    "share input references a missing output during apply",
                ))?;
        commit(
            txn,
            Diff::ShareOutput {
                id: input.parent_id,
                output: existing.clone(),
                direction: Direction::Revert,
            },
            diffs,
        )?;

        let pool_now = txn.pool();
        let grown = pool_now
            .checked_sub(&existing.claim_start)
            .map_err(|_| crate::error::ConsensusError::Corruption(
                "dividend pool fell below a share output's own claimStart",
            ))?;
        let per_share = grown.checked_div_u64(params.total_shares).ok_or(
            crate::error::ConsensusError::Corruption("total_shares is zero"),
        )?;
        let claim = per_share.mul(&existing.value);

        let id = tx.claim_output_id(index);
        let maturity_height = height + params.maturity_delay;
        commit(
            txn,
            Diff::DelayedCoinOutput {
                id,
                output: CoinOutput {
                    value: claim,
                    owner: input.claim_unlock_hash,
                },
                maturity_height,
                direction: Direction::Apply,
            },
            diffs,
        )?;
    }
    for (index, output) in tx.share_outputs.iter().enumerate() {
        let id = tx.share_output_id(index);
        let claim_start = txn.pool();
        commit(
            txn,
            Diff::ShareOutput {
                id,
                output: ShareOutput {
                    value: output.value.clone(),
                    owner: output.owner,
                    claim_start,
                },
                direction: Direction::Apply,
            },
            diffs,
        )?;
    }

    for (index, contract) in tx.file_contracts.iter().enumerate() {
        let id = tx.contract_id(index);
        commit(
            txn,
            Diff::Contract {
                id,
                contract: contract.clone(),
                direction: Direction::Apply,
            },
            diffs,
        )?;

        let previous_pool = txn.pool();
        let tax = params.tax(&contract.payout, height);
        let adjusted_pool = &previous_pool + &tax;
        commit(
            txn,
            Diff::Pool {
                previous: previous_pool,
                adjusted: adjusted_pool,
            },
            diffs,
        )?;
    }

    for revision in &tx.file_contract_revisions {
        let old = txn
            .get_contract(revision.parent_id)
            .ok_or(crate::error::ConsensusError::Corruption(
                "revision references a missing contract during apply",
            ))?;
        commit(
            txn,
            Diff::Contract {
                id: revision.parent_id,
                contract: old.clone(),
                direction: Direction::Revert,
            },
            diffs,
        )?;
        let revised = FileContract {
            file_size: revision.new_file_size,
            merkle_root: revision.new_merkle_root,
            window_start: revision.new_window_start,
            window_end: revision.new_window_end,
            payout: old.payout,
            valid_outputs: revision.new_valid_outputs.clone(),
            missed_outputs: revision.new_missed_outputs.clone(),
            owner: revision.new_owner,
            revision_number: revision.new_revision_number,
        };
        commit(
            txn,
            Diff::Contract {
                id: revision.parent_id,
                contract: revised,
                direction: Direction::Apply,
            },
            diffs,
        )?;
    }

    for proof in &tx.storage_proofs {
        let contract = txn
            .get_contract(proof.parent_id)
            .ok_or(crate::error::ConsensusError::Corruption(
                "storage proof references a missing contract during apply",
            ))?;
        commit(
            txn,
            Diff::Contract {
                id: proof.parent_id,
                contract: contract.clone(),
                direction: Direction::Revert,
            },
            diffs,
        )?;
        let maturity_height = height + params.maturity_delay;
        for (index, output) in contract.valid_outputs.iter().enumerate() {
            let id = derive::contract_valid_output_id(proof.parent_id, index as u64);
            commit(
                txn,
                Diff::DelayedCoinOutput {
                    id,
                    output: output.clone(),
                    maturity_height,
                    direction: Direction::Apply,
                },
                diffs,
            )?;
        }
    }

    Ok(())
}

/// Promotes every entry in the delayed bucket for `height` into the live
/// `CoinOutput` set: one `DelayedCoinOutput` diff (destroying direction,
/// committed Apply, which removes it from the bucket) paired with one
/// `CoinOutput` diff (creating direction) per entry, so reverting this
/// block later replays the pair in reverse and restores exactly the
/// delayed state it started from.
fn mature_delayed_outputs(
    txn: &mut dyn WriteTransaction,
    height: BlockHeight,
    diffs: &mut Vec<Diff>,
) -> Result<(), ApplyError> {
    for (id, output) in txn.delayed_bucket(height) {
        commit(
            txn,
            Diff::DelayedCoinOutput {
                id,
                output: output.clone(),
                maturity_height: height,
                direction: Direction::Revert,
            },
            diffs,
        )?;
        commit(
            txn,
            Diff::CoinOutput {
                id,
                output,
                direction: Direction::Apply,
            },
            diffs,
        )?;
    }
    Ok(())
}

/// Resolves every contract whose window elapsed at `height` with no
/// storage proof: destroys the contract and emits its missed outputs as
/// fresh delayed outputs (spec §3.2, missed-proof path).
fn resolve_expired_contracts(
    txn: &mut dyn WriteTransaction,
    height: BlockHeight,
    params: &NetworkParams,
    diffs: &mut Vec<Diff>,
) -> Result<(), ApplyError> {
    for contract_id in txn.expiry_bucket(height) {
        let contract = match txn.get_contract(contract_id) {
            Some(contract) => contract,
            // Already resolved earlier (e.g. by a storage proof in this
            // same block) — its Contract diff already dropped it from
            // the bucket via `remove_from_expiry`, so this entry is a
            // stale leftover from before that removal ran.
            None => continue,
        };
        commit(
            txn,
            Diff::Contract {
                id: contract_id,
                contract: contract.clone(),
                direction: Direction::Revert,
            },
            diffs,
        )?;
        let maturity_height = height + params.maturity_delay;
        for (index, output) in contract.missed_outputs.iter().enumerate() {
            let id = derive::contract_missed_output_id(contract_id, index as u64);
            commit(
                txn,
                Diff::DelayedCoinOutput {
                    id,
                    output: output.clone(),
                    maturity_height,
                    direction: Direction::Apply,
                },
                diffs,
            )?;
        }
    }
    Ok(())
}

/// Validates and applies every transaction in `block`, then runs the
/// maintenance pass: miner payouts, governance subsidy and address
/// rotation, delayed-output maturation, and expired-contract resolution.
/// `txn` must already be positioned so that `txn.path_at` resolves every
/// ancestor up to (but not including) `height`.
#[tracing::instrument(skip(txn, block, params, merkle), fields(height = height.0))]
pub fn apply_block(
    txn: &mut dyn WriteTransaction,
    block: &Block,
    height: BlockHeight,
    params: &NetworkParams,
    merkle: &dyn uplo_chain::crypto::MerkleVerifier,
) -> Result<AppliedBlock, ApplyError> {
    let mut diffs = Vec::new();

    for tx in &block.transactions {
        {
            let view = BlockView::new(&*txn);
            crate::transaction::stateful_valid(tx, height, &view, merkle)?;
        }
        apply_transaction(txn, tx, height, params, &mut diffs)?;
    }

    let block_id = block.id();
    let maturity_height = height + params.maturity_delay;
    for (index, payout) in block.miner_payouts.iter().enumerate() {
        let id = derive::miner_payout_id(block_id, index as u64);
        commit(
            txn,
            Diff::DelayedCoinOutput {
                id,
                output: CoinOutput {
                    value: payout.value.clone(),
                    owner: payout.owner,
                },
                maturity_height,
                direction: Direction::Apply,
            },
            &mut diffs,
        )?;
    }

    let mut governance_snapshot = None;
    if height.0 >= params.governance_hardfork_height.0 {
        if let Some(candidate) = governance::first_update_in_block(block) {
            let previous = txn.governance();
            if candidate != previous {
                commit(
                    txn,
                    Diff::Governance {
                        previous,
                        adjusted: candidate,
                    },
                    &mut diffs,
                )?;
                governance_snapshot = Some(previous);
            }
        }
    }

    if let Some(amount) = governance::subsidy_due(params, height) {
        let id = derive::foundation_subsidy_id(block_id);
        let owner = txn.governance().primary;
        commit(
            txn,
            Diff::DelayedCoinOutput {
                id,
                output: CoinOutput {
                    value: amount,
                    owner,
                },
                maturity_height,
                direction: Direction::Apply,
            },
            &mut diffs,
        )?;
    }

    mature_delayed_outputs(txn, height, &mut diffs)?;
    resolve_expired_contracts(txn, height, params, &mut diffs)?;

    let checksum = uplo_state::checksum::compute_from_txn(txn);

    Ok(AppliedBlock {
        diffs,
        checksum,
        governance_snapshot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uplo_chain::block::{empty_merkle_root, BlockHeader};
    use uplo_chain::crypto::BinaryMerkleVerifier;
    use uplo_chain::governance::GovernancePair;
    use uplo_chain::ids::UnlockHash;
    use uplo_chain::outputs::MinerPayout;
    use uplo_chain::primitives::Timestamp;
    use uplo_state::memory::MemoryStore;
    use uplo_state::StateStore;

    fn empty_block() -> Block {
        Block {
            header: BlockHeader {
                parent_id: BlockID::from_bytes([0u8; 32]),
                nonce: 0,
                timestamp: Timestamp(1),
                merkle_root: empty_merkle_root(),
            },
            miner_payouts: Vec::new(),
            transactions: Vec::new(),
        }
    }

    #[test]
    fn miner_payouts_land_in_the_delayed_bucket_not_the_live_set() {
        let params = NetworkParams::testing();
        let store = MemoryStore::new(GovernancePair::default());
        let mut block = empty_block();
        block.miner_payouts.push(MinerPayout {
            value: Currency::from_u64(5),
            owner: UnlockHash::from_bytes([9u8; 32]),
        });
        let height = BlockHeight(0);

        let mut txn = store.begin_write();
        let result = apply_block(&mut *txn, &block, height, &params, &BinaryMerkleVerifier).unwrap();
        txn.commit().unwrap();

        let id = derive::miner_payout_id(block.id(), 0);
        assert!(store.get_coin_output(id).is_none());
        assert!(!result.diffs.is_empty());
    }

    #[test]
    fn matured_bucket_promotes_into_the_live_set() {
        let params = NetworkParams::testing();
        let store = MemoryStore::new(GovernancePair::default());
        let block = empty_block();
        let height = BlockHeight(0);
        let maturity = height + params.maturity_delay;

        let id = OutputID::from_bytes([3u8; 32]);
        let output = CoinOutput {
            value: Currency::from_u64(7),
            owner: UnlockHash::from_bytes([4u8; 32]),
        };
        {
            let mut txn = store.begin_write();
            txn.push_delayed(maturity, id, output.clone());
            txn.commit().unwrap();
        }

        let mut later = block.clone();
        later.header.timestamp = Timestamp(2);
        let mut txn = store.begin_write();
        apply_block(&mut *txn, &later, maturity, &params, &BinaryMerkleVerifier).unwrap();
        txn.commit().unwrap();

        assert_eq!(store.get_coin_output(id), Some(output));
    }
}

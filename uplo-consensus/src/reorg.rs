//! Fork-choice and reorg (C8, spec §4.7): deciding whether a newly-stored
//! block's chain now outweighs the active one, and if so, switching the
//! active path over to it — reverting the abandoned blocks' diffs in
//! descending order, then validating-and-applying (or replaying cached
//! diffs for) the new path in ascending order.
//!
//! Everything here runs inside the one [`WriteTransaction`] the caller
//! (`Engine::accept_block`) is driving; a failure partway through the new
//! path is unwound by committing more diffs in the same transaction,
//! never by aborting it — the transaction only ever sees the net result.

use uplo_chain::derive;
use uplo_chain::ids::BlockID;
use uplo_chain::parameters::NetworkParams;
use uplo_chain::primitives::BlockHeight;

use uplo_state::diff::{apply_diffs, Diff, Direction};
use uplo_state::{StoredBlock, WriteTransaction};

use crate::block::apply_block;
use crate::error::ApplyError;
use crate::governance;

/// What switching (or attempting to switch) the active path produced.
pub enum ReorgOutcome {
    /// The candidate's chain does not outweigh the active one; nothing
    /// changed. The block stays in the block map, just not activated.
    NoChange,
    /// The active path changed. `reverted` is highest-height first (the
    /// order blocks were actually reverted in); `applied` is
    /// lowest-height first.
    Switched {
        reverted: Vec<BlockID>,
        applied: Vec<BlockID>,
    },
    /// A block somewhere on the candidate's path (not necessarily the
    /// candidate itself) failed validation. It has been marked invalid
    /// and the active path is exactly as it was before this call.
    Rejected(BlockID, Box<ApplyError>),
}

/// Walks from `candidate` back to the active path, returning the common
/// ancestor's height/id and the candidate's own ancestors above it in
/// ascending (root-to-tip) order.
fn find_fork_point(
    txn: &dyn WriteTransaction,
    candidate: BlockID,
    candidate_height: BlockHeight,
) -> Result<(BlockHeight, Vec<BlockID>), ApplyError> {
    let mut new_chain = Vec::new();
    let mut id = candidate;
    let mut height = candidate_height;

    loop {
        if txn.path_at(height) == Some(id) {
            return Ok((height, new_chain));
        }
        new_chain.insert(0, id);
        let stored = txn.get_stored_block(id).ok_or_else(|| {
            ApplyError::from(crate::error::ConsensusError::Corruption(
                "block map entry missing its own parent while walking back for a fork point",
            ))
        })?;
        id = stored.block.header.parent_id;
        height = match height.checked_sub(1) {
            Some(height) => height,
            None => {
                return Err(ApplyError::from(crate::error::ConsensusError::Corruption(
                    "walked back past genesis without finding a common ancestor",
                )))
            }
        };
    }
}

/// The subsidy a governance-rotating block emits, if it emitted one —
/// the one output [`governance::rewrite_delayed_subsidy_owner`] corrects
/// in place instead of letting the generic diff revert destroy it.
fn own_subsidy_diff_index(diffs: &[Diff], subsidy_id: uplo_chain::ids::OutputID) -> Option<usize> {
    diffs.iter().position(|diff| {
        matches!(diff, Diff::DelayedCoinOutput { id, .. } if *id == subsidy_id)
    })
}

/// Reverts one block's diffs. If the block rotated governance, its own
/// subsidy output (if it emitted one in the same maintenance pass — only
/// possible the block that sits exactly at the hardfork height) is
/// rewritten back to the restored primary instead of being destroyed by
/// the generic diff revert, per spec §4.8.
fn revert_block(
    txn: &mut dyn WriteTransaction,
    params: &NetworkParams,
    id: BlockID,
    stored: &StoredBlock,
) -> Result<(), ApplyError> {
    let mut diffs = stored.diffs.clone();

    if let Some(snapshot) = stored.governance_snapshot {
        let subsidy_id = derive::foundation_subsidy_id(id);
        if let Some(index) = own_subsidy_diff_index(&diffs, subsidy_id) {
            let current_primary = txn.governance().primary;
            governance::rewrite_delayed_subsidy_owner(
                txn,
                params,
                id,
                stored.height,
                current_primary,
                snapshot.primary,
            );
            diffs.remove(index);
        }
    }

    apply_diffs(txn, &diffs, Direction::Revert)?;
    Ok(())
}

/// Re-applies one block's cached diffs going forward (a block that has
/// already been validated once, either because it was on the active path
/// before a failed reorg attempt, or because an earlier reorg attempt
/// validated it without activating it). Mirrors [`revert_block`]'s
/// special-cased subsidy handling in the opposite direction.
fn reapply_cached_block(
    txn: &mut dyn WriteTransaction,
    params: &NetworkParams,
    id: BlockID,
    stored: &StoredBlock,
) -> Result<(), ApplyError> {
    let mut diffs = stored.diffs.clone();

    if let Some(snapshot) = stored.governance_snapshot {
        let subsidy_id = derive::foundation_subsidy_id(id);
        if let Some(index) = own_subsidy_diff_index(&diffs, subsidy_id) {
            let new_primary = diffs
                .iter()
                .find_map(|diff| match diff {
                    Diff::Governance { adjusted, .. } => Some(adjusted.primary),
                    _ => None,
                })
                .expect("a block with a governance_snapshot always carries a Governance diff");
            diffs.remove(index);
            governance::rewrite_delayed_subsidy_owner(
                txn,
                params,
                id,
                stored.height,
                snapshot.primary,
                new_primary,
            );
        }
    }

    apply_diffs(txn, &diffs, Direction::Apply)?;
    Ok(())
}

/// Attempts to switch the active path to `candidate`. `candidate` and
/// every block on its path back to the fork point must already be
/// present in the block map (the caller stores a block's header-level
/// record before calling this, even if its content has not been
/// validated yet). `current_tip` is `None` only for the very first block
/// ever accepted (genesis bootstrap aside, which `Engine` seeds directly
/// rather than routing through here) — the caller (`Engine`) is the one
/// place that keeps the active tip cached across calls, so this module
/// never tries to rediscover it from the path itself.
pub fn try_switch(
    txn: &mut dyn WriteTransaction,
    params: &NetworkParams,
    merkle: &dyn uplo_chain::crypto::MerkleVerifier,
    candidate: BlockID,
    current_tip: Option<(BlockHeight, BlockID)>,
) -> Result<ReorgOutcome, ApplyError> {
    let candidate_stored = txn.get_stored_block(candidate).ok_or_else(|| {
        ApplyError::from(crate::error::ConsensusError::Corruption(
            "try_switch called with a candidate absent from the block map",
        ))
    })?;

    let (tip_height, tip_id) = match current_tip {
        Some(tip) => tip,
        None => {
            apply_new_path(txn, params, merkle, &[candidate]).map_err(|(_, err)| err)?;
            return Ok(ReorgOutcome::Switched {
                reverted: Vec::new(),
                applied: vec![candidate],
            });
        }
    };
    let tip_stored = txn.get_stored_block(tip_id).ok_or_else(|| {
        ApplyError::from(crate::error::ConsensusError::Corruption(
            "active tip missing its own block map record",
        ))
    })?;

    if candidate_stored.cumulative_work <= tip_stored.cumulative_work {
        return Ok(ReorgOutcome::NoChange);
    }

    let (ancestor_height, new_chain) = find_fork_point(txn, candidate, candidate_stored.height)?;

    let mut reverted = Vec::new();
    let mut height = tip_height;
    let mut id = tip_id;
    while height > ancestor_height {
        let stored = txn.get_stored_block(id).ok_or_else(|| {
            ApplyError::from(crate::error::ConsensusError::Corruption(
                "active-path block missing its own block map record during revert",
            ))
        })?;
        revert_block(txn, params, id, &stored)?;
        reverted.push(id);
        id = stored.block.header.parent_id;
        height = match height.checked_sub(1) {
            Some(height) => height,
            None => break,
        };
    }
    txn.truncate_path_from(match ancestor_height.checked_add(1) {
        Some(h) => h,
        None => BlockHeight(0),
    });

    match apply_new_path(txn, params, merkle, &new_chain) {
        Ok(applied) => Ok(ReorgOutcome::Switched { reverted, applied }),
        Err((offending, err)) => {
            // Unwind: revert whatever of the new path made it on, then
            // replay the original path forward from its own cached diffs.
            rollback_failed_switch(txn, params, &new_chain, &offending, ancestor_height)?;
            let mut original = reverted.clone();
            original.reverse();
            for id in &original {
                let stored = txn.get_stored_block(*id).ok_or_else(|| {
                    ApplyError::from(crate::error::ConsensusError::Corruption(
                        "original-path block vanished from the block map during rollback",
                    ))
                })?;
                reapply_cached_block(txn, params, *id, &stored)?;
                txn.set_path(stored.height, *id);
            }
            Ok(ReorgOutcome::Rejected(offending, Box::new(err)))
        }
    }
}

/// Applies `chain` (ascending order) against `txn`, returning the list of
/// applied block IDs on success, or the offending block ID and the error
/// that stopped the walk.
fn apply_new_path(
    txn: &mut dyn WriteTransaction,
    params: &NetworkParams,
    merkle: &dyn uplo_chain::crypto::MerkleVerifier,
    chain: &[BlockID],
) -> Result<Vec<BlockID>, (BlockID, ApplyError)> {
    let mut applied = Vec::new();
    for &id in chain {
        let mut stored = txn
            .get_stored_block(id)
            .ok_or_else(|| {
                (
                    id,
                    ApplyError::from(crate::error::ConsensusError::Corruption(
                        "new-path block missing its own block map record",
                    )),
                )
            })?;

        if stored.diffs_generated {
            if let Err(err) = reapply_cached_block(txn, params, id, &stored) {
                return Err((id, err));
            }
        } else {
            match apply_block(txn, &stored.block, stored.height, params, merkle) {
                Ok(result) => {
                    stored.diffs = result.diffs;
                    stored.diffs_generated = true;
                    stored.checksum = Some(result.checksum);
                    stored.governance_snapshot = result.governance_snapshot;
                    txn.put_stored_block(id, stored.clone());
                }
                Err(ApplyError::Invalid(block_error)) => {
                    stored.invalid = true;
                    txn.put_stored_block(id, stored);
                    return Err((id, ApplyError::Invalid(block_error)));
                }
                Err(corrupt) => return Err((id, corrupt)),
            }
        }
        txn.set_path(stored.height, id);
        applied.push(id);
    }
    Ok(applied)
}

/// Reverts whatever prefix of `chain` made it onto the path before
/// `offending` stopped the walk.
fn rollback_failed_switch(
    txn: &mut dyn WriteTransaction,
    params: &NetworkParams,
    chain: &[BlockID],
    offending: &BlockID,
    ancestor_height: BlockHeight,
) -> Result<(), ApplyError> {
    let made_it_on: Vec<BlockID> = chain.iter().take_while(|id| *id != offending).cloned().collect();
    for id in made_it_on.iter().rev() {
        let stored = txn.get_stored_block(*id).ok_or_else(|| {
            ApplyError::from(crate::error::ConsensusError::Corruption(
                "new-path block vanished from the block map during rollback",
            ))
        })?;
        revert_block(txn, params, *id, &stored)?;
    }
    txn.truncate_path_from(match ancestor_height.checked_add(1) {
        Some(h) => h,
        None => BlockHeight(0),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uplo_chain::block::{empty_merkle_root, BlockHeader};
    use uplo_chain::crypto::BinaryMerkleVerifier;
    use uplo_chain::governance::GovernancePair;
    use uplo_chain::primitives::Timestamp;
    use uplo_chain::Block;
    use uplo_state::memory::MemoryStore;
    use uplo_state::StateStore;

    fn block_on(parent: BlockID, nonce: u64) -> Block {
        Block {
            header: BlockHeader {
                parent_id: parent,
                nonce,
                timestamp: Timestamp(u64::from(nonce) + 1),
                merkle_root: empty_merkle_root(),
            },
            miner_payouts: Vec::new(),
            transactions: Vec::new(),
        }
    }

    fn store_header_only(
        txn: &mut dyn WriteTransaction,
        block: Block,
        height: BlockHeight,
        cumulative_work: u128,
    ) -> BlockID {
        let id = block.id();
        txn.put_stored_block(
            id,
            StoredBlock {
                block,
                height,
                diffs: Vec::new(),
                diffs_generated: false,
                checksum: None,
                cumulative_work,
                governance_snapshot: None,
                invalid: false,
                target: uplo_chain::primitives::Target::ROOT_DEPTH,
                total_difficulty: uplo_chain::currency::Currency::zero(),
                total_time: uplo_chain::currency::Currency::zero(),
            },
        );
        id
    }

    #[test]
    fn a_lighter_candidate_changes_nothing() {
        let params = NetworkParams::testing();
        let store = MemoryStore::new(GovernancePair::default());
        let genesis = BlockID::from_bytes([0u8; 32]);

        let mut txn = store.begin_write();
        let tip = store_header_only(&mut *txn, block_on(genesis, 1), BlockHeight(1), 10);
        txn.set_path(BlockHeight(0), genesis);
        txn.set_path(BlockHeight(1), tip);
        let lighter = store_header_only(&mut *txn, block_on(genesis, 2), BlockHeight(1), 5);

        let outcome = try_switch(
            &mut *txn,
            &params,
            &BinaryMerkleVerifier,
            lighter,
            Some((BlockHeight(1), tip)),
        )
        .unwrap();
        assert!(matches!(outcome, ReorgOutcome::NoChange));
        assert_eq!(txn.path_at(BlockHeight(1)), Some(tip));
    }

    #[test]
    fn a_heavier_candidate_switches_the_active_path() {
        let params = NetworkParams::testing();
        let store = MemoryStore::new(GovernancePair::default());
        let genesis = BlockID::from_bytes([0u8; 32]);

        let mut txn = store.begin_write();
        let old_tip = store_header_only(&mut *txn, block_on(genesis, 1), BlockHeight(1), 10);
        txn.set_path(BlockHeight(0), genesis);
        txn.set_path(BlockHeight(1), old_tip);

        let heavier = store_header_only(&mut *txn, block_on(genesis, 2), BlockHeight(1), 20);
        let outcome = try_switch(
            &mut *txn,
            &params,
            &BinaryMerkleVerifier,
            heavier,
            Some((BlockHeight(1), old_tip)),
        )
        .unwrap();

        match outcome {
            ReorgOutcome::Switched { reverted, applied } => {
                assert_eq!(reverted, vec![old_tip]);
                assert_eq!(applied, vec![heavier]);
            }
            _ => panic!("expected a switch"),
        }
        assert_eq!(txn.path_at(BlockHeight(1)), Some(heavier));
        txn.commit().unwrap();
    }
}

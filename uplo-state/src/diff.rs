//! The diff algebra (C4): every state mutation a block can cause is
//! represented as a tagged, directional diff so that applying a block
//! and reverting it are the same code path run with the direction
//! flipped.
//!
//! Commit rule (spec §4.3, verbatim): a diff whose own direction equals
//! the direction currently being committed *creates* the entity;
//! otherwise it *destroys* it. Reverting a block therefore replays its
//! diffs with the direction flipped rather than needing an inverse diff
//! type.

use uplo_serde_derive::{Decode, Encode};

use uplo_chain::contract::FileContract;
use uplo_chain::currency::Currency;
use uplo_chain::governance::GovernancePair;
use uplo_chain::ids::{ContractID, OutputID};
use uplo_chain::outputs::{CoinOutput, ShareOutput};
use uplo_chain::primitives::BlockHeight;

use crate::store::{StoreError, WriteTransaction};

/// The direction a diff was recorded in, or is being committed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub enum Direction {
    Apply,
    Revert,
}

impl Direction {
    pub fn flip(self) -> Direction {
        match self {
            Direction::Apply => Direction::Revert,
            Direction::Revert => Direction::Apply,
        }
    }
}

/// One tagged state mutation. Every variant but `Pool` carries the
/// direction it was generated under; `Pool` diffs are always recorded
/// Apply-directed (the pool only ever grows) and instead carry the
/// before/after amounts directly.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum Diff {
    CoinOutput {
        id: OutputID,
        output: CoinOutput,
        direction: Direction,
    },
    ShareOutput {
        id: OutputID,
        output: ShareOutput,
        direction: Direction,
    },
    /// A coin output that matures at `maturity_height` (miner payouts,
    /// storage-proof/valid-proof payouts). Lives in the delayed bucket
    /// until that height, then is promoted into the live `CoinOutput`
    /// set by the maintenance pass — never observed as spendable before
    /// its maturity height (spec §3.2 lifecycle).
    DelayedCoinOutput {
        id: OutputID,
        output: CoinOutput,
        maturity_height: BlockHeight,
        direction: Direction,
    },
    Contract {
        id: ContractID,
        contract: FileContract,
        direction: Direction,
    },
    /// The dividend pool never shrinks and is never tagged with a
    /// direction of its own: `previous` is the value before this
    /// block's contribution, `adjusted` is the value after. Reverting
    /// restores `previous`. The invariant `adjusted >= previous` is
    /// checked at commit time, never assumed.
    Pool {
        previous: Currency,
        adjusted: Currency,
    },
    /// The governance pair's value before and after a rotation. Like
    /// `Pool`, always recorded in terms of before/after rather than a
    /// direction: rotations are rare (at most one per block) and
    /// reverting one just restores `previous`.
    Governance {
        previous: GovernancePair,
        adjusted: GovernancePair,
    },
}

/// Removes `id` from the expiry bucket at `height`, leaving every other
/// entry in place. `WriteTransaction` only exposes whole-bucket
/// push/clear, so this reads the bucket, filters, and rewrites it —
/// mirroring the same read-filter-rewrite shape `DelayedCoinOutput`
/// destruction already uses below.
fn remove_from_expiry(txn: &mut dyn WriteTransaction, height: BlockHeight, id: ContractID) {
    let remaining: Vec<_> = txn
        .expiry_bucket(height)
        .into_iter()
        .filter(|existing| existing != &id)
        .collect();
    txn.clear_expiry_bucket(height);
    for id in remaining {
        txn.push_expiry(height, id);
    }
}

/// Applies a single diff against a write transaction, committing it in
/// `committing` direction. Returns an error if doing so would violate
/// the entity's existence precondition.
pub fn commit_diff(
    txn: &mut dyn WriteTransaction,
    diff: &Diff,
    committing: Direction,
) -> Result<(), StoreError> {
    match diff {
        Diff::CoinOutput {
            id,
            output,
            direction,
        } => {
            let creating = *direction == committing;
            if creating {
                if txn.get_coin_output(*id).is_some() {
                    return Err(StoreError::PreconditionViolated(
                        "coin output already exists",
                    ));
                }
                txn.put_coin_output(*id, output.clone());
            } else {
                if txn.delete_coin_output(*id).is_none() {
                    return Err(StoreError::PreconditionViolated(
                        "coin output to destroy does not exist",
                    ));
                }
            }
            Ok(())
        }
        Diff::ShareOutput {
            id,
            output,
            direction,
        } => {
            let creating = *direction == committing;
            if creating {
                if txn.get_share_output(*id).is_some() {
                    return Err(StoreError::PreconditionViolated(
                        "share output already exists",
                    ));
                }
                txn.put_share_output(*id, output.clone());
            } else {
                if txn.delete_share_output(*id).is_none() {
                    return Err(StoreError::PreconditionViolated(
                        "share output to destroy does not exist",
                    ));
                }
            }
            Ok(())
        }
        Diff::Contract {
            id,
            contract,
            direction,
        } => {
            let creating = *direction == committing;
            let window_end = BlockHeight(contract.window_end);
            if creating {
                if txn.get_contract(*id).is_some() {
                    return Err(StoreError::PreconditionViolated("contract already exists"));
                }
                txn.put_contract(*id, contract.clone());
                txn.push_expiry(window_end, *id);
            } else {
                if txn.delete_contract(*id).is_none() {
                    return Err(StoreError::PreconditionViolated(
                        "contract to destroy does not exist",
                    ));
                }
                remove_from_expiry(txn, window_end, *id);
            }
            Ok(())
        }
        Diff::DelayedCoinOutput {
            id,
            output,
            maturity_height,
            direction,
        } => {
            let creating = *direction == committing;
            if creating {
                txn.push_delayed(*maturity_height, *id, output.clone());
                Ok(())
            } else {
                // Reverting before maturity: remove from the delayed
                // bucket. Reverting after maturity (the output has
                // already been promoted) is the caller's responsibility
                // to detect via height comparison before calling this.
                let remaining: Vec<_> = txn
                    .delayed_bucket(*maturity_height)
                    .into_iter()
                    .filter(|(existing_id, _)| existing_id != id)
                    .collect();
                txn.clear_delayed_bucket(*maturity_height);
                for (id, output) in remaining {
                    txn.push_delayed(*maturity_height, id, output);
                }
                Ok(())
            }
        }
        Diff::Pool { previous, adjusted } => {
            if adjusted < previous {
                return Err(StoreError::PoolPreconditionViolated(
                    "adjusted pool value is smaller than its previous value",
                ));
            }
            let target = match committing {
                Direction::Apply => adjusted,
                Direction::Revert => previous,
            };
            let current = txn.pool();
            let expected = match committing {
                Direction::Apply => previous,
                Direction::Revert => adjusted,
            };
            if &current != expected {
                return Err(StoreError::PoolPreconditionViolated(
                    "pool value does not match this diff's expected before-state",
                ));
            }
            txn.set_pool(target.clone());
            Ok(())
        }
        Diff::Governance { previous, adjusted } => {
            let target = match committing {
                Direction::Apply => adjusted,
                Direction::Revert => previous,
            };
            let expected = match committing {
                Direction::Apply => previous,
                Direction::Revert => adjusted,
            };
            if &txn.governance() != expected {
                return Err(StoreError::PreconditionViolated(
                    "governance pair does not match this diff's expected before-state",
                ));
            }
            txn.set_governance(*target);
            Ok(())
        }
    }
}

/// Applies a full block's worth of diffs in order, rolling back the
/// ones already committed if any diff midway fails its precondition —
/// a block is never left partially applied.
pub fn apply_diffs(
    txn: &mut dyn WriteTransaction,
    diffs: &[Diff],
    committing: Direction,
) -> Result<(), StoreError> {
    let ordered: Vec<&Diff> = match committing {
        Direction::Apply => diffs.iter().collect(),
        Direction::Revert => diffs.iter().rev().collect(),
    };
    for (applied, diff) in ordered.iter().enumerate() {
        if let Err(err) = commit_diff(txn, diff, committing) {
            for rollback in ordered[..applied].iter().rev() {
                let _ = commit_diff(txn, rollback, committing.flip());
            }
            return Err(err);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use uplo_chain::governance::GovernancePair;
    use uplo_chain::ids::UnlockHash;

    fn sample_output() -> CoinOutput {
        CoinOutput {
            value: Currency::default(),
            owner: UnlockHash::default(),
        }
    }

    #[test]
    fn applying_then_reverting_a_coin_output_diff_is_a_no_op() {
        let store = MemoryStore::new(GovernancePair::default());
        let id = OutputID::default();
        let diff = Diff::CoinOutput {
            id,
            output: sample_output(),
            direction: Direction::Apply,
        };

        let mut txn = store.begin_write();
        apply_diffs(&mut *txn, &[diff.clone()], Direction::Apply).unwrap();
        assert_eq!(txn.get_coin_output(id), Some(sample_output()));

        apply_diffs(&mut *txn, &[diff], Direction::Revert).unwrap();
        assert_eq!(txn.get_coin_output(id), None);
    }

    #[test]
    fn destroying_a_missing_output_fails_its_precondition() {
        let store = MemoryStore::new(GovernancePair::default());
        let diff = Diff::CoinOutput {
            id: OutputID::default(),
            output: sample_output(),
            direction: Direction::Revert,
        };

        let mut txn = store.begin_write();
        let result = apply_diffs(&mut *txn, &[diff], Direction::Apply);
        assert!(result.is_err());
    }

    #[test]
    fn pool_diff_rejects_a_mismatched_current_value() {
        let store = MemoryStore::new(GovernancePair::default());
        let diff = Diff::Pool {
            previous: Currency::from(5u64),
            adjusted: Currency::from(10u64),
        };

        let mut txn = store.begin_write();
        let result = apply_diffs(&mut *txn, &[diff], Direction::Apply);
        assert!(result.is_err());
    }
}

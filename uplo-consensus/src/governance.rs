//! Governance subsidy emission and address-pair selection (spec §4.8).
//! The address pair's *type* and wire-format tag live in
//! `uplo_chain::governance`; this module is the consensus-level policy
//! built on top — which candidate (if any) wins a block, and when a
//! subsidy is due — plus the revert-time correction the spec calls out
//! for a rotation's own still-delayed subsidy output.

use uplo_chain::currency::Currency;
use uplo_chain::governance::{parse_governance_update, GovernancePair};
use uplo_chain::ids::{BlockID, UnlockHash};
use uplo_chain::parameters::NetworkParams;
use uplo_chain::primitives::BlockHeight;
use uplo_chain::Block;

use uplo_state::WriteTransaction;

/// The governance update that wins a block: the first well-formed,
/// correctly-tagged candidate, scanning transactions in block order and,
/// within a transaction, arbitrary-data entries in declaration order.
/// Every later candidate in the same block is silently dropped — at most
/// one rotation happens per block (spec §4.8).
pub fn first_update_in_block(block: &Block) -> Option<GovernancePair> {
    for tx in &block.transactions {
        for entry in &tx.arbitrary_data {
            if let Some(pair) = parse_governance_update(entry) {
                return Some(pair);
            }
        }
    }
    None
}

/// The governance subsidy due at `height`, if any: `None` before the
/// governance hardfork or off the `subsidy_frequency` cadence; the
/// one-time initial lump exactly at the hardfork height; the steady
/// per-cadence amount (`subsidy_per_block * subsidy_frequency`) on every
/// later cadence boundary.
pub fn subsidy_due(params: &NetworkParams, height: BlockHeight) -> Option<Currency> {
    if height.0 < params.governance_hardfork_height.0 {
        return None;
    }
    if (height.0 - params.governance_hardfork_height.0) % params.subsidy_frequency != 0 {
        return None;
    }
    if height.0 == params.governance_hardfork_height.0 {
        Some(params.subsidy_initial_lump.clone())
    } else {
        Some(params.subsidy_per_block.checked_mul_u64(params.subsidy_frequency))
    }
}

/// Reverting a block that rotated the governance pair restores the
/// pre-image via its `Governance` diff, same as any other field. But a
/// block that rotates governance and also happens to emit its own
/// subsidy in the same maintenance pass (always true exactly at
/// `governance_hardfork_height`, since the cadence check is trivially
/// satisfied there) would otherwise leave the new primary as a dangling
/// owner for the moment between the two diffs reverting; this rewrites
/// that one subsidy output's owner back to the restored primary *before*
/// the generic diff revert would otherwise just delete it outright,
/// matching the spec's "rewritten", not "destroyed", wording. Any
/// subsidy emitted by a *descendant* block is unaffected here — by
/// construction a reorg reverts descendants before their ancestors, so
/// their own `DelayedCoinOutput` diffs already ran.
pub fn rewrite_delayed_subsidy_owner(
    txn: &mut dyn WriteTransaction,
    params: &NetworkParams,
    reverted_block_id: BlockID,
    reverted_height: BlockHeight,
    from: UnlockHash,
    to: UnlockHash,
) {
    let id = uplo_chain::derive::foundation_subsidy_id(reverted_block_id);
    let maturity_height = reverted_height + params.maturity_delay;
    let bucket = txn.delayed_bucket(maturity_height);
    let position = bucket
        .iter()
        .position(|(existing_id, output)| *existing_id == id && output.owner == from);
    let position = match position {
        Some(position) => position,
        None => return,
    };
    let mut updated = bucket;
    updated[position].1.owner = to;
    txn.clear_delayed_bucket(maturity_height);
    for (id, output) in updated {
        txn.push_delayed(maturity_height, id, output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uplo_chain::block::{empty_merkle_root, BlockHeader};
    use uplo_chain::governance::encode_governance_update;
    use uplo_chain::ids::UnlockHash;
    use uplo_chain::primitives::Timestamp;
    use uplo_chain::transaction::Transaction;

    fn block_with_arbitrary_data(entries: Vec<Vec<u8>>) -> Block {
        Block {
            header: BlockHeader {
                parent_id: BlockID::from_bytes([0u8; 32]),
                nonce: 0,
                timestamp: Timestamp(1),
                merkle_root: empty_merkle_root(),
            },
            miner_payouts: Vec::new(),
            transactions: vec![Transaction::new(
                Vec::new(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
                entries,
                Vec::new(),
            )],
        }
    }

    #[test]
    fn first_well_formed_candidate_wins() {
        let first = GovernancePair {
            primary: UnlockHash::from_bytes([1u8; 32]),
            failsafe: UnlockHash::from_bytes([2u8; 32]),
        };
        let second = GovernancePair {
            primary: UnlockHash::from_bytes([3u8; 32]),
            failsafe: UnlockHash::from_bytes([4u8; 32]),
        };
        let block = block_with_arbitrary_data(vec![
            encode_governance_update(&first),
            encode_governance_update(&second),
        ]);
        assert_eq!(first_update_in_block(&block), Some(first));
    }

    #[test]
    fn subsidy_is_due_only_on_the_cadence() {
        let params = NetworkParams::testing();
        let hardfork = params.governance_hardfork_height;
        assert_eq!(
            subsidy_due(&params, hardfork),
            Some(params.subsidy_initial_lump.clone())
        );
        assert_eq!(subsidy_due(&params, hardfork + 1), None);
        assert!(subsidy_due(&params, hardfork + params.subsidy_frequency).is_some());
    }
}

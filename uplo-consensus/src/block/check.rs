//! Header and whole-block validation (spec §4.5): everything about a
//! block that doesn't require committing its diffs. Per-transaction
//! store-dependent checks (`stateful_valid`) and diff application live in
//! [`super::apply`].

use uplo_chain::crypto::SignatureScheme;
use uplo_chain::currency::Currency;
use uplo_chain::parameters::NetworkParams;
use uplo_chain::primitives::{BlockHeight, Target, Timestamp};
use uplo_chain::serialization::Encode;
use uplo_chain::Block;

use crate::error::BlockError;
use crate::transaction::standalone_valid;

/// The median of up to `median_window` preceding timestamps. Returns
/// `None` for genesis, which has no ancestors to compare against.
fn median_timestamp(ancestor_timestamps: &[Timestamp]) -> Option<Timestamp> {
    if ancestor_timestamps.is_empty() {
        return None;
    }
    let mut sorted: Vec<u64> = ancestor_timestamps.iter().map(|t| t.0).collect();
    sorted.sort_unstable();
    Some(Timestamp(sorted[sorted.len() / 2]))
}

/// Validates a block's header (spec §4.5): timestamp ordering against its
/// ancestors and the wall clock, the post-ASIC-hardfork nonce rule, and
/// proof of work against `target` (computed by the difficulty engine from
/// the parent's stored state, never carried on the wire — see
/// `uplo_state::StoredBlock::target`).
pub fn header_valid(
    block: &Block,
    height: BlockHeight,
    ancestor_timestamps: &[Timestamp],
    target: Target,
    now: Timestamp,
    params: &NetworkParams,
) -> Result<(), BlockError> {
    let header = &block.header;

    if let Some(median) = median_timestamp(ancestor_timestamps) {
        if header.timestamp <= median {
            return Err(BlockError::EarlyTimestamp);
        }
    }

    if header.timestamp.saturating_sub(now) > params.extreme_future_threshold {
        return Err(BlockError::ExtremeFutureTimestamp);
    }
    if header.timestamp.saturating_sub(now) > params.future_threshold {
        return Err(BlockError::FutureTimestamp);
    }

    if height.0 >= params.asic_hardfork_height.0 && header.nonce % params.asic_factor != 0 {
        return Err(BlockError::BadNonce);
    }

    if !header.meets_target(&target) {
        return Err(BlockError::UnsolvedBlock);
    }

    Ok(())
}

fn check_size(block: &Block, params: &NetworkParams) -> Result<(), BlockError> {
    let size = block.encode_to_vec().len() as u64;
    if size > params.block_size_limit {
        return Err(BlockError::LargeBlock {
            actual: size,
            limit: params.block_size_limit,
        });
    }
    Ok(())
}

/// A block's miner payouts must sum to exactly the height's subsidy plus
/// every included transaction's fees, with no individual payout of zero.
fn check_miner_payouts(block: &Block, height: BlockHeight, params: &NetworkParams) -> Result<(), BlockError> {
    if block.miner_payouts.iter().any(|payout| payout.value.is_zero()) {
        return Err(BlockError::BadMinerPayouts);
    }
    let fees: Currency = block.transactions.iter().map(|tx| tx.fee_sum()).sum();
    let expected = params.subsidy(height) + fees;
    let actual: Currency = block.miner_payouts.iter().map(|p| p.value.clone()).sum();
    if actual != expected {
        return Err(BlockError::BadMinerPayouts);
    }
    Ok(())
}

/// Every check on a block that doesn't require a store view: the header,
/// the size limit, the miner payout accounting, and each transaction's
/// `standalone_valid`.
pub fn block_valid(
    block: &Block,
    height: BlockHeight,
    ancestor_timestamps: &[Timestamp],
    target: Target,
    now: Timestamp,
    params: &NetworkParams,
    scheme: &dyn SignatureScheme,
) -> Result<(), BlockError> {
    header_valid(block, height, ancestor_timestamps, target, now, params)?;
    check_size(block, params)?;
    check_miner_payouts(block, height, params)?;
    for tx in &block.transactions {
        standalone_valid(tx, height, params, scheme)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uplo_chain::block::BlockHeader;
    use uplo_chain::ids::BlockID;

    fn sample_block(timestamp: Timestamp, nonce: u64) -> Block {
        Block {
            header: BlockHeader {
                parent_id: BlockID::from_bytes([0u8; 32]),
                nonce,
                timestamp,
                merkle_root: uplo_chain::block::empty_merkle_root(),
            },
            miner_payouts: Vec::new(),
            transactions: Vec::new(),
        }
    }

    #[test]
    fn rejects_a_timestamp_at_or_before_the_median() {
        let params = NetworkParams::testing();
        let block = sample_block(Timestamp(100), 0);
        let ancestors = vec![Timestamp(100), Timestamp(90), Timestamp(80)];
        let result = header_valid(&block, BlockHeight(4), &ancestors, Target::ROOT_DEPTH, Timestamp(1_000), &params);
        assert!(matches!(result, Err(BlockError::EarlyTimestamp)));
    }

    #[test]
    fn rejects_a_far_future_timestamp() {
        let params = NetworkParams::testing();
        let block = sample_block(Timestamp(1_000_000), 0);
        let result = header_valid(&block, BlockHeight(1), &[], Target::ROOT_DEPTH, Timestamp(1), &params);
        assert!(matches!(result, Err(BlockError::ExtremeFutureTimestamp)));
    }

    #[test]
    fn rejects_an_unsolved_block() {
        let params = NetworkParams::testing();
        let block = sample_block(Timestamp(100), 0);
        let tight = Target::from_bytes([0u8; 32]);
        let result = header_valid(&block, BlockHeight(1), &[], tight, Timestamp(100), &params);
        assert!(matches!(result, Err(BlockError::UnsolvedBlock)));
    }

    #[test]
    fn rejects_a_nonzero_miner_payout_sum_mismatch() {
        let params = NetworkParams::testing();
        let mut block = sample_block(Timestamp(100), 0);
        block.miner_payouts.push(uplo_chain::outputs::MinerPayout {
            value: Currency::from_u64(1),
            owner: uplo_chain::ids::UnlockHash::from_bytes([1u8; 32]),
        });
        let result = check_miner_payouts(&block, BlockHeight(0), &params);
        assert!(matches!(result, Err(BlockError::BadMinerPayouts)));
    }
}

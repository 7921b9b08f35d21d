//! The difficulty engine (C7): the legacy pre-Oak retarget and the
//! post-hardfork Oak algorithm, both expressed in integer/big-integer
//! arithmetic only (spec §4.6 forbids floating point anywhere in
//! consensus).
//!
//! Every block's target is wholly a function of its parent's *stored*
//! difficulty state — [`StoredBlock::target`] / `total_difficulty` /
//! `total_time` — never of anything carried on the wire, so this module
//! only ever reads the store, never the block being validated.

use num_bigint::BigUint;
use num_traits::ToPrimitive;

use uplo_chain::currency::Currency;
use uplo_chain::parameters::NetworkParams;
use uplo_chain::primitives::{BlockHeight, Target, Timestamp};
use uplo_state::{StateStore, StoredBlock};

/// Difficulty implied by `target`: inversely proportional to it, so that
/// an easier target (more hashes satisfy it) yields a smaller number and
/// cumulative sums are meaningful as "work done".
fn difficulty_of(target: &Target) -> Currency {
    let root = Currency::from_bytes_be(Target::ROOT_DEPTH.as_bytes());
    let t = Currency::from_bytes_be(target.as_bytes());
    if t.is_zero() {
        return root;
    }
    root.checked_div(&t).unwrap_or(root)
}

/// Scales `target` by `numerator/denominator` with `min_ratio`/`max_ratio`
/// clamping, like [`Target::scale_clamped`], but rounding the final
/// division half-up instead of truncating when `round` is set. The
/// "Oak fix" hardfork changes exactly this rounding detail (spec §4.6).
fn scale_clamped_rounded(
    target: &Target,
    numerator: u64,
    denominator: u64,
    min_ratio: (u64, u64),
    max_ratio: (u64, u64),
    round: bool,
) -> Target {
    if !round {
        return target.scale_clamped(numerator, denominator, min_ratio, max_ratio);
    }

    let denominator = denominator.max(1);
    let num = numerator as u128;
    let den = denominator as u128;
    let min_num = min_ratio.0 as u128;
    let min_den = min_ratio.1.max(1) as u128;
    let max_num = max_ratio.0 as u128;
    let max_den = max_ratio.1.max(1) as u128;

    let (num, den) = if num * min_den < min_num * den {
        (min_num, min_den)
    } else if num * max_den > max_num * den {
        (max_num, max_den)
    } else {
        (num, den)
    };

    let value = BigUint::from_bytes_be(target.as_bytes());
    let product = value * BigUint::from(num);
    let divisor = BigUint::from(den);
    let mut quotient = &product / &divisor;
    let remainder = &product % &divisor;
    if &remainder * 2u32 >= divisor {
        quotient += 1u32;
    }

    let max = BigUint::from_bytes_be(Target::ROOT_DEPTH.as_bytes());
    if quotient > max {
        quotient = max;
    }
    let bytes = quotient.to_bytes_be();
    let mut out = [0u8; 32];
    let offset = 32 - bytes.len().min(32);
    out[offset..].copy_from_slice(&bytes[bytes.len().saturating_sub(32)..]);
    Target::from_bytes(out)
}

/// The parent's decayed totals to retarget the child against: either the
/// parent's own stored totals, or, for the very first Oak-era block, the
/// network's fixed bootstrap constants — pre-Oak blocks never tracked
/// decayed totals at all (spec §4.6 point 4).
fn oak_bootstrap_totals(params: &NetworkParams, parent: &StoredBlock) -> (Currency, Currency) {
    if parent.height.0 + 1 == params.oak_hardfork_height.0 {
        (
            Currency::from_u128(params.oak_initial_total_difficulty),
            Currency::from_u128(params.oak_initial_total_time as u128),
        )
    } else {
        (parent.total_difficulty.clone(), parent.total_time.clone())
    }
}

/// The per-block Oak retarget (spec §4.6, post-`oak_hardfork_height`):
/// the new block's target from the parent's decayed `total_difficulty`/
/// `total_time` and its own target, with one rounding-detail branch at
/// `oak_fix_hardfork_height`.
fn oak_target(params: &NetworkParams, height: BlockHeight, parent: &StoredBlock) -> Target {
    let (total_difficulty, total_time) = oak_bootstrap_totals(params, parent);

    let difficulty_estimate = difficulty_of(&parent.target);
    let expected_time = total_difficulty
        .checked_mul_u64(params.block_frequency)
        .checked_div(&difficulty_estimate)
        .unwrap_or_else(|| Currency::from_u64(params.block_frequency));

    let raw = total_time
        .checked_mul_u64(params.block_frequency)
        .checked_div(&expected_time)
        .unwrap_or_else(|| Currency::from_u64(params.block_frequency));

    let raw_u64 = raw.to_u64_saturating();
    let lo = params.block_frequency.saturating_sub(params.max_shift);
    let hi = params.block_frequency.saturating_add(params.max_shift);
    let clamped_raw = raw_u64.clamp(lo, hi);

    let round = height.0 >= params.oak_fix_hardfork_height.0;
    scale_clamped_rounded(
        &parent.target,
        clamped_raw,
        params.block_frequency,
        params.max_drop,
        params.max_rise,
        round,
    )
}

/// Every `target_window` blocks, rescale by `actualTime/expectedTime`
/// clamped to `[max_adjustment_down, max_adjustment_up]` (spec §4.6,
/// pre-Oak legacy path). Between retarget boundaries the target is
/// unchanged from the parent.
fn legacy_target(
    params: &NetworkParams,
    store: &dyn StateStore,
    child_height: BlockHeight,
    parent: &StoredBlock,
) -> Target {
    if child_height.0 < params.target_window || child_height.0 % params.target_window != 0 {
        return parent.target;
    }

    let window_start_height = BlockHeight(child_height.0 - params.target_window);
    let window_start = match store
        .path_at(window_start_height)
        .and_then(|id| store.get_stored_block(id))
    {
        Some(stored) => stored,
        None => return parent.target,
    };

    let actual_time = parent
        .block
        .header
        .timestamp
        .saturating_sub(window_start.block.header.timestamp)
        .max(1);
    let expected_time = params.target_window * params.block_frequency;

    // `max_adjustment_down` bounds how far the target may shrink (harder);
    // `max_adjustment_up` names the rise bound the same shape, so it is
    // inverted here (e.g. stored as `(1, 4)`, used as `(4, 1)` meaning "up
    // to 4x easier").
    let min_ratio = params.max_adjustment_down;
    let max_ratio = (params.max_adjustment_up.1, params.max_adjustment_up.0);
    parent
        .target
        .scale_clamped(actual_time, expected_time, min_ratio, max_ratio)
}

/// The target a new block at `height` (whose parent is `parent`) must
/// meet, branching on whether `height` is at or past the Oak hardfork.
pub fn target_for_child(
    params: &NetworkParams,
    store: &dyn StateStore,
    height: BlockHeight,
    parent: &StoredBlock,
) -> Target {
    if height.0 >= params.oak_hardfork_height.0 {
        oak_target(params, height, parent)
    } else {
        legacy_target(params, store, height, parent)
    }
}

/// The decayed `total_difficulty`/`total_time` a newly-accepted block at
/// `height` carries forward, so that *its* children can retarget against
/// it in turn. Computed once the block's real `timestamp` is known.
pub fn accumulate(
    params: &NetworkParams,
    height: BlockHeight,
    parent: &StoredBlock,
    own_target: Target,
    timestamp: Timestamp,
) -> (Currency, Currency) {
    if height.0 < params.oak_hardfork_height.0 {
        // Pre-Oak blocks don't meaningfully track decayed totals; carry
        // zero forward so the bootstrap branch in `oak_bootstrap_totals`
        // is the one that seeds the first Oak-era block's real values.
        return (Currency::zero(), Currency::zero());
    }

    let (prev_total_difficulty, prev_total_time) = oak_bootstrap_totals(params, parent);

    let decayed_difficulty = prev_total_difficulty
        .checked_mul_u64(params.decay_num)
        .checked_div_u64(params.decay_denom)
        .unwrap_or_else(Currency::zero);
    let decayed_time = prev_total_time
        .checked_mul_u64(params.decay_num)
        .checked_div_u64(params.decay_denom)
        .unwrap_or_else(Currency::zero);

    let interval = timestamp.saturating_sub(parent.block.header.timestamp);
    let new_total_difficulty = decayed_difficulty + difficulty_of(&own_target);
    let new_total_time = decayed_time + Currency::from_u64(interval);

    (new_total_difficulty, new_total_time)
}

/// This block's own contribution to cumulative chain work, for
/// fork-choice comparison (spec §4.7): the difficulty implied by the
/// target it had to meet.
pub fn work_of(target: Target) -> u128 {
    let difficulty = difficulty_of(&target);
    difficulty.as_biguint().to_u128().unwrap_or(u128::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_of_root_depth_is_one() {
        let d = difficulty_of(&Target::ROOT_DEPTH);
        assert_eq!(d, Currency::from_u64(1));
    }

    #[test]
    fn halving_the_target_doubles_difficulty() {
        let half = Target::ROOT_DEPTH.scale(1, 2);
        let d = difficulty_of(&half);
        assert_eq!(d, Currency::from_u64(2));
    }

    #[test]
    fn unrounded_scale_matches_scale_clamped() {
        let t = Target::from_bytes([0xff; 32]);
        let scaled = scale_clamped_rounded(&t, 1, 2, (1, 4), (4, 1), false);
        let expected = t.scale_clamped(1, 2, (1, 4), (4, 1));
        assert_eq!(scaled, expected);
    }
}

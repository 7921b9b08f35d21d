//! `BlockHeight`, `Timestamp`, and `Target`: the small scalar types the
//! header and difficulty engine are built from.

use uplo_serde_derive::{Decode, Encode};

use crate::ids::Hash;

/// Height of a block on the chain path. Genesis is height 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct BlockHeight(pub u64);

impl BlockHeight {
    pub const GENESIS: BlockHeight = BlockHeight(0);

    pub fn checked_add(self, delta: u64) -> Option<BlockHeight> {
        self.0.checked_add(delta).map(BlockHeight)
    }

    pub fn checked_sub(self, delta: u64) -> Option<BlockHeight> {
        self.0.checked_sub(delta).map(BlockHeight)
    }
}

impl std::ops::Add<u64> for BlockHeight {
    type Output = BlockHeight;
    fn add(self, rhs: u64) -> BlockHeight {
        BlockHeight(self.0 + rhs)
    }
}

impl std::fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Seconds since the Unix epoch. A plain `u64` rather than a calendar type:
/// consensus arithmetic on timestamps is all integer subtraction and
/// comparison, never calendar-aware.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn saturating_sub(self, rhs: Timestamp) -> u64 {
        self.0.saturating_sub(rhs.0)
    }
}

/// A 32-byte big-endian proof-of-work threshold. A block ID "meets" a
/// target iff its byte string, read as a big-endian unsigned integer, is
/// `<=` the target.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct Target(pub Hash);

impl Target {
    /// The easiest possible target: all bits set, i.e. every hash meets it.
    pub const ROOT_DEPTH: Target = Target(Hash([0xff; 32]));

    pub fn from_bytes(bytes: [u8; 32]) -> Target {
        Target(Hash::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Ratio-scale this target by `numerator / denominator` using 256-bit
    /// unsigned arithmetic, clamped so it never exceeds `ROOT_DEPTH` or
    /// underflows to zero. Used by both the legacy and Oak retarget rules;
    /// consensus forbids floating point, so this is all big-integer math.
    pub fn scale(&self, numerator: u64, denominator: u64) -> Target {
        use num_bigint::BigUint;
        let value = BigUint::from_bytes_be(self.as_bytes());
        let scaled = (value * BigUint::from(numerator)) / BigUint::from(denominator.max(1));
        let max = BigUint::from_bytes_be(&Target::ROOT_DEPTH.0 .0);
        let clamped = if scaled > max { max } else { scaled };
        let bytes = clamped.to_bytes_be();
        let mut out = [0u8; 32];
        let offset = 32 - bytes.len().min(32);
        out[offset..].copy_from_slice(&bytes[bytes.len().saturating_sub(32)..]);
        Target(Hash(out))
    }

    /// Like [`Target::scale`], but the ratio itself is first clamped to
    /// `[min_ratio, max_ratio]` (each a numerator/denominator pair). Used
    /// by the Oak retarget's per-step rise/drop limits, which bound how
    /// far a single block may move the target regardless of how extreme
    /// the raw ratio computed from block times would otherwise be.
    pub fn scale_clamped(
        &self,
        numerator: u64,
        denominator: u64,
        min_ratio: (u64, u64),
        max_ratio: (u64, u64),
    ) -> Target {
        let denominator = denominator.max(1);

        // The ratios involved (rise/drop factors like 1004/1000, block-time
        // ratios bounded by small integers) comfortably fit u128, so the
        // clamp is done there and only the final scale promotes to BigUint.
        let num = numerator as u128;
        let den = denominator as u128;
        let min_num = min_ratio.0 as u128;
        let min_den = min_ratio.1.max(1) as u128;
        let max_num = max_ratio.0 as u128;
        let max_den = max_ratio.1.max(1) as u128;

        let (clamped_num, clamped_den) = if num * min_den < min_num * den {
            (min_num, min_den)
        } else if num * max_den > max_num * den {
            (max_num, max_den)
        } else {
            (num, den)
        };

        self.scale(clamped_num as u64, clamped_den as u64)
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Target({:?})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_clamps_at_root_depth() {
        let scaled = Target::ROOT_DEPTH.scale(2, 1);
        assert_eq!(scaled, Target::ROOT_DEPTH);
    }

    #[test]
    fn scale_halves() {
        let t = Target::from_bytes([0xff; 32]);
        let half = t.scale(1, 2);
        let expected = num_bigint::BigUint::from_bytes_be(&[0xff; 32]) / 2u32;
        assert_eq!(
            num_bigint::BigUint::from_bytes_be(half.as_bytes()),
            expected
        );
    }
}

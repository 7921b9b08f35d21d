//! Arbitrary-precision, non-negative currency values.
//!
//! Amounts in this system can exceed `u64` once totals are summed across a
//! long-running chain's emission schedule, so `Currency` is backed by
//! `num_bigint::BigUint` rather than a fixed-width integer. Arithmetic never
//! wraps: subtraction is checked and returns a `CurrencyError` on underflow,
//! addition is infallible (a negative result is unrepresentable, not an
//! overflow, so there is nothing to check).

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use thiserror::Error;

use crate::serialization::{Decode, DecodeError, Encode};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencyError {
    #[error("currency underflow: cannot subtract a larger value from a smaller one")]
    Underflow,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Currency(BigUint);

impl Currency {
    pub fn zero() -> Currency {
        Currency(BigUint::zero())
    }

    pub fn from_u64(value: u64) -> Currency {
        Currency(BigUint::from(value))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_sub(&self, other: &Currency) -> Result<Currency, CurrencyError> {
        if self.0 < other.0 {
            Err(CurrencyError::Underflow)
        } else {
            Ok(Currency(&self.0 - &other.0))
        }
    }

    pub fn saturating_sub(&self, other: &Currency) -> Currency {
        if self.0 < other.0 {
            Currency::zero()
        } else {
            Currency(&self.0 - &other.0)
        }
    }

    /// Truncating (floor) integer division, used by dividend-claim
    /// arithmetic where rounding toward zero is the specified behavior.
    pub fn checked_div_u64(&self, divisor: u64) -> Option<Currency> {
        if divisor == 0 {
            None
        } else {
            Some(Currency(&self.0 / BigUint::from(divisor)))
        }
    }

    pub fn checked_mul_u64(&self, factor: u64) -> Currency {
        Currency(&self.0 * BigUint::from(factor))
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    pub fn from_u128(value: u128) -> Currency {
        Currency(BigUint::from(value))
    }

    /// Interprets `bytes` as an unsigned big-endian integer, e.g. a raw
    /// [`crate::primitives::Target`]'s bytes, for difficulty arithmetic
    /// that otherwise never touches a `Currency`.
    pub fn from_bytes_be(bytes: &[u8]) -> Currency {
        Currency(BigUint::from_bytes_be(bytes))
    }

    /// Big-integer multiplication, used where a `u64` factor (see
    /// [`Currency::checked_mul_u64`]) isn't wide enough, e.g. share-claim
    /// amounts against values that are themselves arbitrary precision.
    pub fn mul(&self, other: &Currency) -> Currency {
        Currency(&self.0 * &other.0)
    }

    /// Big-integer floor division. `None` if `other` is zero.
    pub fn checked_div(&self, other: &Currency) -> Option<Currency> {
        if other.is_zero() {
            None
        } else {
            Some(Currency(&self.0 / &other.0))
        }
    }

    /// Saturates to `u64::MAX` rather than panicking or wrapping; used only
    /// where the caller already knows the value fits in practice (e.g. a
    /// clamped block-time ratio) and an overflow would indicate a bug
    /// upstream rather than a value to represent exactly.
    pub fn to_u64_saturating(&self) -> u64 {
        self.0.to_u64().unwrap_or(u64::MAX)
    }
}

impl From<BigUint> for Currency {
    fn from(value: BigUint) -> Currency {
        Currency(value)
    }
}

impl From<u64> for Currency {
    fn from(value: u64) -> Currency {
        Currency::from_u64(value)
    }
}

impl Add for Currency {
    type Output = Currency;
    fn add(self, rhs: Currency) -> Currency {
        Currency(self.0 + rhs.0)
    }
}

impl Add for &Currency {
    type Output = Currency;
    fn add(self, rhs: &Currency) -> Currency {
        Currency(&self.0 + &rhs.0)
    }
}

/// Panics on underflow; use [`Currency::checked_sub`] anywhere the operands
/// are not already known-safe by a prior invariant check.
impl Sub for &Currency {
    type Output = Currency;
    fn sub(self, rhs: &Currency) -> Currency {
        self.checked_sub(rhs)
            .expect("currency subtraction underflowed where the caller guaranteed it could not")
    }
}

impl Sum for Currency {
    fn sum<I: Iterator<Item = Currency>>(iter: I) -> Currency {
        iter.fold(Currency::zero(), |acc, x| acc + x)
    }
}

impl<'a> Sum<&'a Currency> for Currency {
    fn sum<I: Iterator<Item = &'a Currency>>(iter: I) -> Currency {
        iter.fold(Currency::zero(), |acc, x| &acc + x)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Minimal big-endian bytes, length-prefixed per the codec's 8-byte LE
/// count convention. `BigUint::to_bytes_be` already drops leading zero
/// bytes, so this is the canonical minimal encoding.
impl Encode for Currency {
    fn encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.0.to_bytes_be().encode(&mut target)
    }
}

impl Decode for Currency {
    fn decode<R: std::io::Read>(target: R) -> Result<Currency, DecodeError> {
        let bytes = Vec::<u8>::decode(target)?;
        Ok(Currency(BigUint::from_bytes_be(&bytes)))
    }
}

#[cfg(feature = "proptest-impl")]
impl proptest::arbitrary::Arbitrary for Currency {
    type Parameters = ();
    type Strategy = proptest::strategy::BoxedStrategy<Currency>;

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        use proptest::prelude::*;
        (0u64..u64::MAX).prop_map(Currency::from_u64).boxed()
    }
}

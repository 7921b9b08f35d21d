//! The two UTXO asset classes and the inputs that consume them.

use uplo_serde_derive::{Decode, Encode};

use crate::currency::Currency;
use crate::ids::{OutputID, UnlockHash};
use crate::unlock::UnlockConditions;

/// A spendable class-A ("coin") output.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct CoinOutput {
    pub value: Currency,
    pub owner: UnlockHash,
}

/// A spendable class-B ("share") output. `claim_start` snapshots the
/// dividend pool at creation time; spending it pays out the pool growth
/// since then, proportional to `value`, to a nominated address.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct ShareOutput {
    pub value: Currency,
    pub owner: UnlockHash,
    pub claim_start: Currency,
}

/// Consumes a [`CoinOutput`].
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct CoinInput {
    pub parent_id: OutputID,
    pub unlock_conditions: UnlockConditions,
}

/// Consumes a [`ShareOutput`], nominating the address that receives the
/// delayed dividend claim generated by the spend.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct ShareInput {
    pub parent_id: OutputID,
    pub unlock_conditions: UnlockConditions,
    pub claim_unlock_hash: UnlockHash,
}

/// A miner's share of a block's subsidy plus fees. Unlike a `CoinOutput`,
/// a payout has no input and is created only by block maintenance; its ID
/// is derived from `(blockID, payout index)` rather than a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct MinerPayout {
    pub value: Currency,
    pub owner: UnlockHash,
}

#[cfg(any(test, feature = "proptest-impl"))]
mod arbitrary {
    use proptest::prelude::*;

    use super::{CoinOutput, ShareOutput};
    use crate::currency::Currency;
    use crate::ids::UnlockHash;

    impl Arbitrary for CoinOutput {
        type Parameters = ();
        type Strategy = BoxedStrategy<CoinOutput>;

        fn arbitrary_with(_args: ()) -> Self::Strategy {
            (any::<Currency>(), any::<[u8; 32]>())
                .prop_filter("coin outputs are never zero-valued", |(value, _)| !value.is_zero())
                .prop_map(|(value, owner)| CoinOutput {
                    value,
                    owner: UnlockHash::from_bytes(owner),
                })
                .boxed()
        }
    }

    impl Arbitrary for ShareOutput {
        type Parameters = ();
        type Strategy = BoxedStrategy<ShareOutput>;

        fn arbitrary_with(_args: ()) -> Self::Strategy {
            (any::<Currency>(), any::<[u8; 32]>())
                .prop_filter("share outputs are never zero-valued", |(value, _)| !value.is_zero())
                .prop_map(|(value, owner)| ShareOutput {
                    value,
                    owner: UnlockHash::from_bytes(owner),
                    // claimStart is set by the engine at apply time, never
                    // by the transaction that creates the output.
                    claim_start: Currency::zero(),
                })
                .boxed()
        }
    }
}

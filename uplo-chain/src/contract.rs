//! On-chain file-storage escrow: contracts, revisions, and storage proofs.

use uplo_serde_derive::{Decode, Encode};

use crate::currency::Currency;
use crate::ids::{ContractID, Hash, UnlockHash};
use crate::outputs::CoinOutput;
use crate::unlock::UnlockConditions;

/// A time-locked escrow settled either by a [`StorageProof`] submitted
/// before `window_end`, or by maintenance at `window_end` if none arrives.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct FileContract {
    pub file_size: u64,
    pub merkle_root: Hash,
    pub window_start: u64,
    pub window_end: u64,
    pub payout: Currency,
    /// Paid out if a valid storage proof is submitted in the window.
    pub valid_outputs: Vec<CoinOutput>,
    /// Paid out if the window elapses with no valid proof.
    pub missed_outputs: Vec<CoinOutput>,
    pub owner: UnlockHash,
    pub revision_number: u64,
}

impl FileContract {
    pub fn valid_proof_sum(&self) -> Currency {
        self.valid_outputs.iter().map(|o| o.value.clone()).sum()
    }

    pub fn missed_proof_sum(&self) -> Currency {
        self.missed_outputs.iter().map(|o| o.value.clone()).sum()
    }
}

/// Mutates an existing, still-open contract in place. Must preserve
/// `payout` and the sum of each output vector; may only increase
/// `revision_number`; must not move `window_start` earlier than the
/// current chain tip.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct FileContractRevision {
    pub parent_id: ContractID,
    pub unlock_conditions: UnlockConditions,
    pub new_revision_number: u64,
    pub new_file_size: u64,
    pub new_merkle_root: Hash,
    pub new_window_start: u64,
    pub new_window_end: u64,
    pub new_valid_outputs: Vec<CoinOutput>,
    pub new_missed_outputs: Vec<CoinOutput>,
    pub new_owner: UnlockHash,
}

/// A Merkle inclusion proof for the deterministically chosen segment of a
/// contract's file, settling it in favor of `valid_outputs`.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct StorageProof {
    pub parent_id: ContractID,
    pub segment: Vec<u8>,
    pub proof: Vec<Hash>,
}

/// The fixed leaf size storage-proof Merkle trees are built over: exactly
/// the width of a [`Hash`], so a proof's `segment` can be fed to
/// [`crate::crypto::MerkleVerifier::verify`] as a raw leaf without a
/// separate hashing step. Not a `NetworkParams` field: changing it would
/// change every contract's segment count retroactively, so it is a
/// wire-level constant rather than a deployment-tunable one.
pub const SEGMENT_SIZE: u64 = 32;

/// Which segment of a contract's file a storage proof must cover, and how
/// large it is. A pure function of the contract and the block ID at
/// `window_start`; recomputing it must be bit-identical across nodes.
pub fn segment_index(
    contract_id: ContractID,
    block_id_at_window_start: crate::ids::BlockID,
    file_size: u64,
    segment_size: u64,
) -> (u64, u64) {
    if file_size == 0 || segment_size == 0 {
        return (0, 0);
    }
    let num_segments = (file_size + segment_size - 1) / segment_size;
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(contract_id.as_bytes());
    data.extend_from_slice(block_id_at_window_start.as_bytes());
    let digest = crate::ids::domain_hash(crate::ids::TAG_STORAGE_PROOF, &data);
    let index_bytes: [u8; 8] = digest.as_bytes()[0..8].try_into().expect("8 bytes");
    let index = u64::from_be_bytes(index_bytes) % num_segments;
    let size = if index == num_segments - 1 {
        file_size - segment_size * (num_segments - 1)
    } else {
        segment_size
    };
    (index, size)
}

#[cfg(any(test, feature = "proptest-impl"))]
mod arbitrary {
    use proptest::collection::vec;
    use proptest::prelude::*;

    use super::FileContract;
    use crate::currency::Currency;
    use crate::ids::{Hash, UnlockHash};
    use crate::outputs::CoinOutput;

    impl Arbitrary for FileContract {
        type Parameters = ();
        type Strategy = BoxedStrategy<FileContract>;

        fn arbitrary_with(_args: ()) -> Self::Strategy {
            (
                any::<u64>(),
                any::<[u8; 32]>(),
                1u64..1000,
                vec(any::<CoinOutput>(), 1..3),
                any::<[u8; 32]>(),
                any::<u64>(),
            )
                .prop_map(
                    |(file_size, merkle_root, window_len, valid_outputs, owner, revision_number)| {
                        let payout: Currency = valid_outputs.iter().map(|o| o.value.clone()).sum();
                        FileContract {
                            file_size,
                            merkle_root: Hash(merkle_root),
                            window_start: 1,
                            window_end: 1 + window_len,
                            payout,
                            missed_outputs: valid_outputs.clone(),
                            valid_outputs,
                            owner: UnlockHash::from_bytes(owner),
                            revision_number,
                        }
                    },
                )
                .boxed()
        }
    }
}

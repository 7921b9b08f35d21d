//! Pluggable cryptographic primitives.
//!
//! Signature verification and Merkle-proof verification are the two
//! cryptographic operations the consensus engine performs that are *not*
//! fixed algorithms: tests substitute deterministic stubs for both, so both
//! are expressed as small object-safe traits rather than hard-coded calls.
//! Domain-separated ID hashing (see [`crate::ids`]) is deliberately not
//! here — it is a fixed part of the codec, since varying it would itself
//! be a consensus fork.

use crate::ids::Hash;

pub use ed25519_dalek::{PublicKey, Signature};

/// Verifies a signature over a message under a public key.
pub trait SignatureScheme: Send + Sync {
    fn verify(&self, public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool;
}

/// The production signature scheme: standard ed25519 verification.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Scheme;

impl SignatureScheme for Ed25519Scheme {
    fn verify(&self, public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
        use ed25519_dalek::Verifier;
        public_key.verify(message, signature).is_ok()
    }
}

/// Verifies that a leaf, combined with a sibling-hash proof path, reduces
/// to the claimed Merkle root.
pub trait MerkleVerifier: Send + Sync {
    fn verify(&self, leaf: Hash, proof: &[Hash], leaf_index: u64, num_leaves: u64, root: Hash)
        -> bool;
}

/// Binary Merkle tree over an arbitrary number of leaves (not necessarily a
/// power of two). File-contract segment counts are `ceil(fileSize /
/// segmentSize)`, so the tree must tolerate unbalanced leaf counts: at each
/// level a lone trailing node is carried up unchanged rather than paired
/// with itself, following the standard unbalanced-binary-Merkle-tree
/// convention this system's storage proofs rely on.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryMerkleVerifier;

impl MerkleVerifier for BinaryMerkleVerifier {
    fn verify(
        &self,
        leaf: Hash,
        proof: &[Hash],
        leaf_index: u64,
        num_leaves: u64,
        root: Hash,
    ) -> bool {
        if num_leaves == 0 {
            return false;
        }

        let mut hash = crate::ids::merkle_leaf_hash(leaf.as_bytes());
        let mut index = leaf_index;
        let mut width = num_leaves;

        for sibling in proof {
            if width <= 1 {
                return false;
            }
            let has_sibling = index ^ 1 < width || (index % 2 == 0 && index + 1 < width);
            if !has_sibling {
                // A lone trailing node at this level is promoted unchanged;
                // the proof should not contain a step for it.
                return false;
            }
            hash = if index % 2 == 0 {
                crate::ids::merkle_interior_hash(&hash, sibling)
            } else {
                crate::ids::merkle_interior_hash(sibling, &hash)
            };
            index /= 2;
            width = (width + 1) / 2;
        }

        hash == root
    }
}

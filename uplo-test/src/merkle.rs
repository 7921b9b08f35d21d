//! A reference builder for the unbalanced binary Merkle trees storage
//! proofs are checked against, pairing
//! `uplo_chain::crypto::BinaryMerkleVerifier`'s verification algorithm
//! with the construction side it never needed to own itself.

use uplo_chain::contract::SEGMENT_SIZE;
use uplo_chain::ids::{merkle_interior_hash, merkle_leaf_hash, Hash};

/// Splits `data` into `SEGMENT_SIZE`-byte segments, zero-padding the
/// final one — the same chunking a real uploader's tree is built over.
pub fn segments_of(data: &[u8]) -> Vec<Vec<u8>> {
    if data.is_empty() {
        return Vec::new();
    }
    data.chunks(SEGMENT_SIZE as usize).map(|chunk| chunk.to_vec()).collect()
}

/// Builds the Merkle root over `leaves` (each padded to exactly
/// `SEGMENT_SIZE` bytes, raw, before leaf-hashing) and, for every leaf, an
/// inclusion proof path in `BinaryMerkleVerifier`'s sibling-per-level
/// convention.
pub fn build_tree(leaves: &[Vec<u8>]) -> (Hash, Vec<Vec<Hash>>) {
    let n = leaves.len();
    if n == 0 {
        return (merkle_leaf_hash(&[]), Vec::new());
    }

    let mut level: Vec<Hash> = leaves
        .iter()
        .map(|segment| {
            let mut padded = [0u8; 32];
            padded[..segment.len()].copy_from_slice(segment);
            merkle_leaf_hash(&padded)
        })
        .collect();

    // proofs[i] accumulates the sibling path for leaf i as the tree is
    // built bottom-up, one level at a time.
    let mut proofs: Vec<Vec<Hash>> = vec![Vec::new(); n];
    let mut indices: Vec<usize> = (0..n).collect();

    while level.len() > 1 {
        let width = level.len();
        let mut next = Vec::with_capacity((width + 1) / 2);
        let mut pair_of = vec![0usize; width];
        let mut chunk_index = 0;
        let mut i = 0;
        while i < width {
            if i + 1 < width {
                next.push(merkle_interior_hash(&level[i], &level[i + 1]));
                pair_of[i] = chunk_index;
                pair_of[i + 1] = chunk_index;
                i += 2;
            } else {
                next.push(level[i]);
                pair_of[i] = chunk_index;
                i += 1;
            }
            chunk_index += 1;
        }

        for (leaf, &pos) in indices.iter().enumerate() {
            let sibling = if pos % 2 == 0 { pos + 1 } else { pos - 1 };
            if sibling < width && pair_of[sibling] == pair_of[pos] && sibling != pos {
                proofs[leaf].push(level[sibling]);
            }
            // A lone trailing node (no sibling this level) contributes no
            // proof step and is simply promoted to `next[pair_of[pos]]`.
        }

        indices = indices.iter().map(|&pos| pair_of[pos]).collect();
        level = next;
    }

    (level[0], proofs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uplo_chain::crypto::{BinaryMerkleVerifier, MerkleVerifier};

    #[test]
    fn every_leaf_verifies_against_its_own_proof() {
        let leaves: Vec<Vec<u8>> = (0u8..5).map(|b| vec![b; 10]).collect();
        let (root, proofs) = build_tree(&leaves);
        let verifier = BinaryMerkleVerifier;
        for (index, segment) in leaves.iter().enumerate() {
            let mut padded = [0u8; 32];
            padded[..segment.len()].copy_from_slice(segment);
            let leaf = Hash(padded);
            assert!(verifier.verify(leaf, &proofs[index], index as u64, leaves.len() as u64, root));
        }
    }

    #[test]
    fn single_leaf_needs_no_proof() {
        let leaves = vec![vec![7u8; 32]];
        let (root, proofs) = build_tree(&leaves);
        assert!(proofs[0].is_empty());
        let leaf = Hash([7u8; 32]);
        assert!(BinaryMerkleVerifier.verify(leaf, &proofs[0], 0, 1, root));
    }
}

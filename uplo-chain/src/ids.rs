//! 32-byte hash and domain-separated ID types.
//!
//! Every ID in this system is derived the same way: hash a fixed 16-byte
//! ASCII tag together with whatever canonical bytes identify the thing
//! being named (a transaction's no-signatures encoding plus an output
//! index, a contract's encoding, a block ID, ...). The tag makes it
//! impossible for, say, a coin output and a share output that happen to
//! share an encoding prefix to collide on ID.

use std::fmt;
use std::str::FromStr;

use crate::serialization::{Decode, DecodeError, Encode};

/// A 16-byte ASCII domain-separation tag, zero-padded on the right.
pub type Tag = [u8; 16];

const fn tag(s: &str) -> Tag {
    let bytes = s.as_bytes();
    assert!(bytes.len() <= 16, "domain tag longer than 16 bytes");
    let mut out = [0u8; 16];
    let mut i = 0;
    while i < bytes.len() {
        out[i] = bytes[i];
        i += 1;
    }
    out
}

pub const TAG_UPLOCOIN_INPUT: Tag = tag("Uplocoin input");
pub const TAG_UPLOCOIN_OUTPUT: Tag = tag("Uplocoin output");
pub const TAG_UPLOFUND_INPUT: Tag = tag("uplofund input");
pub const TAG_UPLOFUND_OUTPUT: Tag = tag("uplofund output");
pub const TAG_FILE_CONTRACT: Tag = tag("file contract");
pub const TAG_FILE_CONTRACT_REVISION: Tag = tag("file contract re");
pub const TAG_STORAGE_PROOF: Tag = tag("storage proof");
pub const TAG_CLAIM_OUTPUT: Tag = tag("claim output");
pub const TAG_MINER_FEE: Tag = tag("miner fee");
pub const TAG_MINER_PAYOUT: Tag = tag("miner payout");
pub const TAG_FOUNDATION: Tag = tag("foundation");

/// Hashes a domain tag followed by an arbitrary byte string with BLAKE2b-256.
///
/// This is the one consensus-critical hash function in the system: unlike
/// signature verification or Merkle-proof checking, it is never behind a
/// pluggable trait, because varying it between deployments would itself be
/// a hard fork.
pub fn domain_hash(domain: Tag, data: &[u8]) -> Hash {
    let mut state = blake2b_simd::Params::new().hash_length(32).to_state();
    state.update(&domain);
    state.update(data);
    let digest = state.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(digest.as_bytes());
    Hash(out)
}

/// Hashes two children together for Merkle-tree reconstruction, with the
/// standard 0x01 interior-node prefix distinguishing them from leaves
/// (hashed with a 0x00 prefix by the caller).
pub fn merkle_interior_hash(left: &Hash, right: &Hash) -> Hash {
    let mut state = blake2b_simd::Params::new().hash_length(32).to_state();
    state.update(&[0x01]);
    state.update(left.as_bytes());
    state.update(right.as_bytes());
    let digest = state.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(digest.as_bytes());
    Hash(out)
}

pub fn merkle_leaf_hash(data: &[u8]) -> Hash {
    let mut state = blake2b_simd::Params::new().hash_length(32).to_state();
    state.update(&[0x00]);
    state.update(data);
    let digest = state.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(digest.as_bytes());
    Hash(out)
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub fn from_bytes(bytes: [u8; 32]) -> Hash {
        Hash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Does this hash, read as a big-endian unsigned integer, meet the
    /// given target (also big-endian)? Used for both header-ID proof of
    /// work and Merkle-path verification ordering.
    pub fn meets_target(&self, target: &Hash) -> bool {
        self.0 <= target.0
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Hash {
    type Err = hex::FromHexError;
    fn from_str(s: &str) -> Result<Hash, hex::FromHexError> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out)?;
        Ok(Hash(out))
    }
}

impl Encode for Hash {
    fn encode<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error> {
        self.0.encode(target)
    }
}

impl Decode for Hash {
    fn decode<R: std::io::Read>(target: R) -> Result<Hash, DecodeError> {
        Ok(Hash(<[u8; 32]>::decode(target)?))
    }
}

/// Declares a 32-byte newtype ID wrapping [`Hash`], with `Display`/`Debug`/
/// `FromStr`/codec impls generated once instead of by hand per type. This
/// system needs five distinct ID types (`BlockID`, `TransactionID`,
/// `OutputID`, `ContractID`, `UnlockHash`); none of them should be
/// interchangeable with each other even though they share a representation.
macro_rules! define_hash_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub Hash);

        impl $name {
            pub fn from_bytes(bytes: [u8; 32]) -> $name {
                $name(Hash::from_bytes(bytes))
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                self.0.as_bytes()
            }

            pub fn meets_target(&self, target: &Hash) -> bool {
                self.0.meets_target(target)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = hex::FromHexError;
            fn from_str(s: &str) -> Result<$name, hex::FromHexError> {
                Ok($name(Hash::from_str(s)?))
            }
        }

        impl Encode for $name {
            fn encode<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error> {
                self.0.encode(target)
            }
        }

        impl Decode for $name {
            fn decode<R: std::io::Read>(target: R) -> Result<$name, DecodeError> {
                Ok($name(Hash::decode(target)?))
            }
        }

        impl From<Hash> for $name {
            fn from(hash: Hash) -> $name {
                $name(hash)
            }
        }
    };
}

define_hash_id!(BlockID);
define_hash_id!(TransactionID);
define_hash_id!(OutputID);
define_hash_id!(ContractID);
define_hash_id!(UnlockHash);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_tags_are_distinct_and_fit() {
        let tags = [
            TAG_UPLOCOIN_INPUT,
            TAG_UPLOCOIN_OUTPUT,
            TAG_UPLOFUND_INPUT,
            TAG_UPLOFUND_OUTPUT,
            TAG_FILE_CONTRACT,
            TAG_FILE_CONTRACT_REVISION,
            TAG_STORAGE_PROOF,
            TAG_CLAIM_OUTPUT,
            TAG_MINER_FEE,
            TAG_MINER_PAYOUT,
            TAG_FOUNDATION,
        ];
        for (i, a) in tags.iter().enumerate() {
            for b in &tags[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn domain_hash_is_deterministic() {
        let a = domain_hash(TAG_UPLOCOIN_OUTPUT, b"same input");
        let b = domain_hash(TAG_UPLOCOIN_OUTPUT, b"same input");
        assert_eq!(a, b);
        let c = domain_hash(TAG_UPLOFUND_OUTPUT, b"same input");
        assert_ne!(a, c);
    }
}

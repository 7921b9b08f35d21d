//! Spend conditions and transaction signatures.
//!
//! Every output's `owner` field is not a public key directly, but the
//! domain-separated hash of an [`UnlockConditions`] value: a timelock plus
//! an M-of-N set of public keys. This is a fixed, declarative scheme
//! standing in for a full scripting VM (out of scope here), mirroring the
//! closed set of spend conditions a UTXO system needs without a general
//! interpreter.

use uplo_serde_derive::{Decode, Encode};

use crate::crypto::{PublicKey, Signature};
use crate::ids::{domain_hash, TransactionID, UnlockHash, TAG_UPLOCOIN_OUTPUT};
use crate::serialization::{Decode, Encode};

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct UnlockConditions {
    pub timelock: u64,
    pub public_keys: Vec<PublicKeyBytes>,
    pub signatures_required: u64,
}

impl UnlockConditions {
    /// The `UnlockHash` a matching output must name as its owner.
    pub fn unlock_hash(&self) -> UnlockHash {
        domain_hash(TAG_UPLOCOIN_OUTPUT, &self.encode_to_vec()).into()
    }
}

/// `ed25519_dalek::PublicKey` does not implement our codec directly (it
/// wraps a fixed byte array behind an opaque type); this newtype carries
/// the 32-byte encoding and converts to/from the `dalek` type at the
/// validator boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKeyBytes(pub [u8; 32]);

impl From<PublicKey> for PublicKeyBytes {
    fn from(key: PublicKey) -> PublicKeyBytes {
        PublicKeyBytes(key.to_bytes())
    }
}

impl std::convert::TryFrom<PublicKeyBytes> for PublicKey {
    type Error = ed25519_dalek::SignatureError;
    fn try_from(bytes: PublicKeyBytes) -> Result<PublicKey, Self::Error> {
        PublicKey::from_bytes(&bytes.0)
    }
}

impl Encode for PublicKeyBytes {
    fn encode<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error> {
        self.0.encode(target)
    }
}

impl crate::serialization::Decode for PublicKeyBytes {
    fn decode<R: std::io::Read>(
        target: R,
    ) -> Result<PublicKeyBytes, crate::serialization::DecodeError> {
        Ok(PublicKeyBytes(<[u8; 32]>::decode(target)?))
    }
}

/// Which parts of a transaction a signature is declared to cover, per
/// §9's source-pattern remapping: a signature either covers the whole
/// (no-signatures) transaction, or an explicit list of field indices.
/// Storage-proof-only transactions must reject partial coverage.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum CoveredFields {
    WholeTransaction,
    Explicit {
        coin_inputs: Vec<u64>,
        coin_outputs: Vec<u64>,
        share_inputs: Vec<u64>,
        share_outputs: Vec<u64>,
        contracts: Vec<u64>,
        revisions: Vec<u64>,
        storage_proofs: Vec<u64>,
        miner_fees: Vec<u64>,
        arbitrary_data: Vec<u64>,
    },
}

/// A signature attached to a transaction, naming the input it authorizes
/// (`input_index`) and which of that input's declared public keys signed
/// (`public_key_index`).
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct TransactionSignature {
    pub input_id: crate::ids::OutputID,
    pub public_key_index: u64,
    pub covered_fields: CoveredFields,
    pub signature: SignatureBytes,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureBytes(pub [u8; 64]);

impl From<Signature> for SignatureBytes {
    fn from(sig: Signature) -> SignatureBytes {
        SignatureBytes(sig.to_bytes())
    }
}

impl std::convert::TryFrom<&SignatureBytes> for Signature {
    type Error = ed25519_dalek::SignatureError;
    fn try_from(bytes: &SignatureBytes) -> Result<Signature, Self::Error> {
        Signature::from_bytes(&bytes.0)
    }
}

impl Encode for SignatureBytes {
    fn encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.0.to_vec().encode(&mut target)
    }
}

impl crate::serialization::Decode for SignatureBytes {
    fn decode<R: std::io::Read>(
        target: R,
    ) -> Result<SignatureBytes, crate::serialization::DecodeError> {
        let bytes = Vec::<u8>::decode(target)?;
        let mut out = [0u8; 64];
        if bytes.len() != 64 {
            return Err(crate::serialization::DecodeError::Parse(
                "signature must be 64 bytes",
            ));
        }
        out.copy_from_slice(&bytes);
        Ok(SignatureBytes(out))
    }
}

/// The message a [`TransactionSignature`] signs: the owning transaction's
/// no-signatures encoding, optionally narrowed by `covered_fields`.
pub fn sig_hash(no_sig_encoding: &[u8], txid: &TransactionID) -> crate::ids::Hash {
    let mut message = Vec::with_capacity(no_sig_encoding.len() + 32);
    message.extend_from_slice(txid.as_bytes());
    message.extend_from_slice(no_sig_encoding);
    crate::ids::domain_hash(crate::ids::TAG_UPLOCOIN_INPUT, &message)
}

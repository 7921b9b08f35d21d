//! A single ed25519 keypair wrapped as a 1-of-1 unlock condition, the
//! shape every golden vector's spending inputs use. Mirrors the signing
//! dance already exercised by `uplo-consensus`'s own
//! `transaction::check` unit tests, just factored out so every crate's
//! integration tests can build one without repeating it.

use ed25519_dalek::{Keypair, Signer as _};
use rand_core::OsRng;

use uplo_chain::ids::{OutputID, UnlockHash};
use uplo_chain::transaction::Transaction;
use uplo_chain::unlock::{CoveredFields, PublicKeyBytes, SignatureBytes, TransactionSignature, UnlockConditions};

/// Owns a keypair and the single-signature [`UnlockConditions`] derived
/// from it, so an output locked to [`Signer::unlock_hash`] can later be
/// spent by [`Signer::sign_whole_transaction`].
pub struct Signer {
    keypair: Keypair,
}

impl Signer {
    pub fn generate() -> Signer {
        let mut csprng = OsRng;
        Signer {
            keypair: Keypair::generate(&mut csprng),
        }
    }

    pub fn conditions(&self) -> UnlockConditions {
        UnlockConditions {
            timelock: 0,
            public_keys: vec![PublicKeyBytes::from(self.keypair.public)],
            signatures_required: 1,
        }
    }

    pub fn unlock_hash(&self) -> UnlockHash {
        self.conditions().unlock_hash()
    }

    /// Signs `tx` (already fully assembled, signatures aside) on behalf
    /// of the input spending `input_id`, covering the whole transaction.
    pub fn sign_whole_transaction(&self, tx: &Transaction, input_id: OutputID) -> TransactionSignature {
        let digest = tx.sig_hash();
        let signature = self.keypair.sign(digest.as_bytes());
        TransactionSignature {
            input_id,
            public_key_index: 0,
            covered_fields: CoveredFields::WholeTransaction,
            signature: SignatureBytes::from(signature),
        }
    }
}

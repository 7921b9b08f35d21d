//! Transaction encoding, including the distinguished no-signatures
//! encoding used for ID derivation and `SigHash`.

use crate::contract::{FileContract, FileContractRevision, StorageProof};
use crate::currency::Currency;
use crate::outputs::{CoinInput, CoinOutput, ShareInput, ShareOutput};
use crate::serialization::{Decode, DecodeError, Encode};
use crate::unlock::TransactionSignature;

use super::Transaction;

/// A hard decode-time cap, distinct from `NetworkParams::block_size_limit`
/// / `tx_size_limit_post_hardfork` (the consensus rules the validator
/// enforces); this is purely a DoS guard on an adversarial stream.
pub const MAX_TX_SIZE: u64 = 8 * 1024 * 1024;

/// Encodes every field except `signatures`, in declaration order. This is
/// the input to both transaction ID derivation and `SigHash`: signatures
/// must never affect either, or a transaction's dependents (referencing
/// it by ID within the same block) would be invalidated by any change to
/// its signature set.
pub fn no_signatures_encoding(tx: &Transaction) -> Vec<u8> {
    let mut out = Vec::new();
    tx.coin_inputs.encode(&mut out).expect("vec encode is infallible");
    tx.coin_outputs.encode(&mut out).expect("vec encode is infallible");
    tx.share_inputs.encode(&mut out).expect("vec encode is infallible");
    tx.share_outputs.encode(&mut out).expect("vec encode is infallible");
    tx.file_contracts.encode(&mut out).expect("vec encode is infallible");
    tx.file_contract_revisions
        .encode(&mut out)
        .expect("vec encode is infallible");
    tx.storage_proofs.encode(&mut out).expect("vec encode is infallible");
    tx.miner_fees.encode(&mut out).expect("vec encode is infallible");
    tx.arbitrary_data.encode(&mut out).expect("vec encode is infallible");
    out
}

impl Encode for Transaction {
    fn encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        target.write_all(&no_signatures_encoding(self))?;
        self.signatures.encode(&mut target)
    }
}

impl Decode for Transaction {
    fn decode<R: std::io::Read>(target: R) -> Result<Transaction, DecodeError> {
        let mut limited = target.take(MAX_TX_SIZE);
        let coin_inputs = Vec::<CoinInput>::decode(&mut limited)?;
        let coin_outputs = Vec::<CoinOutput>::decode(&mut limited)?;
        let share_inputs = Vec::<ShareInput>::decode(&mut limited)?;
        let share_outputs = Vec::<ShareOutput>::decode(&mut limited)?;
        let file_contracts = Vec::<FileContract>::decode(&mut limited)?;
        let file_contract_revisions = Vec::<FileContractRevision>::decode(&mut limited)?;
        let storage_proofs = Vec::<StorageProof>::decode(&mut limited)?;
        let miner_fees = Vec::<Currency>::decode(&mut limited)?;
        let arbitrary_data = Vec::<Vec<u8>>::decode(&mut limited)?;
        let signatures = Vec::<TransactionSignature>::decode(&mut limited)?;
        Ok(Transaction::new(
            coin_inputs,
            coin_outputs,
            share_inputs,
            share_outputs,
            file_contracts,
            file_contract_revisions,
            storage_proofs,
            miner_fees,
            arbitrary_data,
            signatures,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_transaction_roundtrips() {
        let tx = Transaction::new(
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );
        let bytes = tx.encode_to_vec();
        let decoded = Transaction::decode(bytes.as_slice()).unwrap();
        assert_eq!(tx.id(), decoded.id());
    }

    #[test]
    fn signatures_do_not_affect_id() {
        let no_sigs = Transaction::new(
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            vec![Currency::from_u64(1)],
            Vec::new(),
            Vec::new(),
        );
        let with_sigs = Transaction::new(
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            vec![Currency::from_u64(1)],
            Vec::new(),
            vec![crate::unlock::TransactionSignature {
                input_id: crate::ids::OutputID::from_bytes([1u8; 32]),
                public_key_index: 0,
                covered_fields: crate::unlock::CoveredFields::WholeTransaction,
                signature: crate::unlock::SignatureBytes([0u8; 64]),
            }],
        );
        assert_eq!(no_sigs.id(), with_sigs.id());
    }
}

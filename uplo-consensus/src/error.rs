//! Error kinds for the transaction and block validators (C5/C6).
//!
//! One `thiserror`-derived enum per layer, following the teacher's
//! `BlockTimeError`/`SerializationError` shape: a variant per rule, carrying
//! the offending IDs/heights as fields rather than a formatted string built
//! by the caller.

use thiserror::Error;

use uplo_chain::ids::{BlockID, ContractID, OutputID, TransactionID};
use uplo_chain::primitives::BlockHeight;
use uplo_state::StoreError;

/// A transaction failed `standalone_valid` or `stateful_valid` (§4.4).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("input {0:?} double-spends an output already consumed earlier in this transaction")]
    DoubleSpend(OutputID),

    #[error("input {0:?} references an output that does not exist in the current view")]
    MissingOutput(OutputID),

    #[error("revision or storage proof references contract {0:?}, which does not exist in the current view")]
    MissingContract(ContractID),

    #[error("unlock conditions for output {0:?} do not hash to its owner")]
    WrongUnlockConditions(OutputID),

    #[error("input {0:?} is still timelocked until height {1}")]
    TimelockNotSatisfied(OutputID, BlockHeight),

    #[error("signature verification failed for input {0:?}")]
    SignatureFailure(OutputID),

    #[error("contract or revision window is malformed: windowStart {window_start}, windowEnd {window_end}, height {height}")]
    WindowViolation {
        window_start: BlockHeight,
        window_end: BlockHeight,
        height: BlockHeight,
    },

    #[error("output sums do not balance for contract {0:?}")]
    OutputSumMismatch(ContractID),

    #[error("transaction {0:?} spends coin inputs that do not sum to its outputs, fees, and new contract payouts")]
    CoinsNotConserved(TransactionID),

    #[error("transaction {0:?} spends share inputs that do not sum to its share outputs")]
    SharesNotConserved(TransactionID),

    #[error("output {0:?} has a zero value")]
    ZeroOutput(OutputID),

    #[error("transaction has a zero miner fee")]
    ZeroMinerFee,

    #[error("share output {0:?} declares a nonzero claimStart")]
    NonZeroClaimStart(OutputID),

    #[error("transaction carries a storage proof alongside creation outputs")]
    StorageProofWithOutputs,

    #[error("storage proof for contract {0:?} does not hash to the contract's merkle root")]
    BadStorageProof(ContractID),

    #[error("contract {0:?} already has a storage proof accepted against it")]
    DuplicateStorageProof(ContractID),

    #[error("revision for contract {0:?} does not strictly increase the revision number")]
    RevisionNumberNotIncreasing(ContractID),

    #[error("revision for contract {0:?} was not signed by the contract's current owner")]
    RevisionUnlockMismatch(ContractID),

    #[error("transaction is {actual} bytes, over the {limit}-byte limit")]
    TxTooLarge { actual: u64, limit: u64 },

    #[error("arbitrary-data entry tagged as a governance update does not decode to a valid address pair")]
    InvalidGovernanceUpdate,
}

/// A block failed header validation, or contains a transaction that failed
/// validation (§4.5).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("block timestamp is at or before the median of the last window of block times")]
    EarlyTimestamp,

    #[error("block timestamp is further in the future than the retry threshold allows")]
    FutureTimestamp,

    #[error("block timestamp is further in the future than any retry threshold allows")]
    ExtremeFutureTimestamp,

    #[error("block id does not meet its target")]
    UnsolvedBlock,

    #[error("block is {actual} bytes, over the {limit}-byte limit")]
    LargeBlock { actual: u64, limit: u64 },

    #[error("miner payouts do not sum to subsidy plus collected fees, or contain a zero payout")]
    BadMinerPayouts,

    #[error("nonce is not a multiple of the post-hardfork ASIC factor")]
    BadNonce,

    #[error("block {0:?} names a parent that is not present in the block map")]
    MissingParent(BlockID),

    #[error("block {0:?} was already quarantined as invalid on an earlier submission")]
    KnownInvalid(BlockID),

    #[error("block contains an invalid transaction: {0}")]
    ContainsInvalidTx(#[from] TransactionError),
}

/// An error that halts the engine rather than just rejecting one block: the
/// store reported a state that the engine's own invariants say cannot happen.
/// Per §7, these are never silently ignored — they're logged at
/// `tracing::error!` and latch a poisoned flag checked by every public
/// [`crate::Engine`] method.
#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("internal consistency violation: {0}")]
    Corruption(&'static str),

    #[error("store backend error: {0}")]
    Store(#[from] StoreError),
}

/// The two ways applying a single block can fail: the block (or one of
/// its transactions) is invalid, rejected normally and the offending ID
/// quarantined; or the store reported something that can only mean
/// corruption once standalone/stateful validation has already passed,
/// which halts the engine instead (§7).
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error(transparent)]
    Invalid(#[from] BlockError),

    #[error(transparent)]
    Corrupt(#[from] ConsensusError),
}

impl From<TransactionError> for ApplyError {
    fn from(err: TransactionError) -> ApplyError {
        ApplyError::Invalid(BlockError::ContainsInvalidTx(err))
    }
}

impl From<StoreError> for ApplyError {
    fn from(err: StoreError) -> ApplyError {
        ApplyError::Corrupt(ConsensusError::Store(err))
    }
}

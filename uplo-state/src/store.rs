//! The `StateStore` contract (spec §4.2): named buckets for every
//! persistent entity class, grouped under one write transaction per
//! block so partial application never becomes visible.

use thiserror::Error;
use uplo_serde_derive::{Decode, Encode};

use uplo_chain::contract::FileContract;
use uplo_chain::currency::Currency;
use uplo_chain::governance::GovernancePair;
use uplo_chain::ids::{BlockID, ContractID, Hash, OutputID};
use uplo_chain::outputs::{CoinOutput, ShareOutput};
use uplo_chain::primitives::{BlockHeight, Target};
use uplo_chain::Block;

use crate::diff::Diff;

#[derive(Error, Debug)]
pub enum StoreError {
    /// A diff's precondition was violated: applying it would create an ID
    /// that already exists, or destroying it would remove an ID that
    /// isn't there. This is the mechanism that naturally catches
    /// "double apply" bugs like a duplicate storage proof (see spec §9).
    #[error("diff precondition violated: {0}")]
    PreconditionViolated(&'static str),

    /// The pool's stricter invariant (`adjusted >= previous`, and the
    /// current value matching the diff's expected before-state) failed.
    #[error("pool diff precondition violated: {0}")]
    PoolPreconditionViolated(&'static str),

    /// The underlying backend reported an I/O or encoding failure.
    #[error("store backend error: {0}")]
    Backend(#[from] crate::BoxError),

    /// An invariant the store itself is responsible for maintaining
    /// (e.g. a referenced entity that must exist is missing) was
    /// violated. Per spec §7, this is unrecoverable corruption, never
    /// silently ignored.
    #[error("internal consistency violation: {0}")]
    Corruption(&'static str),
}

/// A processed block's record in the block map: its own bytes, the diffs
/// it produced (owned by the block, never shared), whether those diffs
/// have been generated yet, and a post-hoc consistency checksum.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct StoredBlock {
    pub block: Block,
    pub height: BlockHeight,
    pub diffs: Vec<Diff>,
    pub diffs_generated: bool,
    pub checksum: Option<Hash>,
    pub cumulative_work: u128,
    /// Present only on blocks that rotated the governance pair; lets a
    /// revert restore the pre-image in O(1) instead of replaying history.
    pub governance_snapshot: Option<GovernancePair>,
    /// Set permanently on a block that failed validation; such an ID is
    /// never reconsidered.
    pub invalid: bool,

    /// The proof-of-work target this block itself had to meet. Unlike
    /// Bitcoin, the wire header carries no difficulty field: the target
    /// is wholly a function of the parent's stored difficulty state (the
    /// Oak algorithm, §4.6), so it has to live on the stored record
    /// rather than the header.
    pub target: Target,
    /// The decayed cumulative difficulty total as of this block,
    /// carried forward by the Oak retarget to compute its children's
    /// target. Stored as a [`Currency`] purely to reuse its big-integer
    /// codec; it is not a spendable amount.
    pub total_difficulty: Currency,
    /// The decayed cumulative block-time total as of this block, the
    /// other half of the Oak retarget's running state.
    pub total_time: Currency,
}

/// The bucketed, transactional persistent store. One write transaction
/// covers all buckets touched while applying or reverting a single
/// block.
pub trait StateStore: Send + Sync {
    fn begin_write(&self) -> Box<dyn WriteTransaction + '_>;

    fn get_coin_output(&self, id: OutputID) -> Option<CoinOutput>;
    fn get_share_output(&self, id: OutputID) -> Option<ShareOutput>;
    fn get_contract(&self, id: ContractID) -> Option<FileContract>;
    fn get_stored_block(&self, id: BlockID) -> Option<StoredBlock>;
    fn path_at(&self, height: BlockHeight) -> Option<BlockID>;
    fn tip(&self) -> Option<(BlockHeight, BlockID)>;
    fn pool(&self) -> Currency;
    fn governance(&self) -> GovernancePair;

    /// Every live entity ID in each of the three ID-keyed buckets, in no
    /// particular order. Used by the consistency checksum (§4.5) and by
    /// conservation-invariant tests (§8); not on any validation hot path.
    fn all_coin_output_ids(&self) -> Vec<OutputID>;
    fn all_share_output_ids(&self) -> Vec<OutputID>;
    fn all_contract_ids(&self) -> Vec<ContractID>;
}

/// A single write transaction. Buckets are mutated through plain
/// methods; nothing is visible to other readers until [`commit`] (or,
/// for the diff-driven entity classes, until the whole batch of diffs
/// for a block has been applied through [`crate::diff::apply_diffs`]).
///
/// [`commit`]: WriteTransaction::commit
pub trait WriteTransaction {
    fn get_coin_output(&self, id: OutputID) -> Option<CoinOutput>;
    fn put_coin_output(&mut self, id: OutputID, output: CoinOutput);
    fn delete_coin_output(&mut self, id: OutputID) -> Option<CoinOutput>;

    fn get_share_output(&self, id: OutputID) -> Option<ShareOutput>;
    fn put_share_output(&mut self, id: OutputID, output: ShareOutput);
    fn delete_share_output(&mut self, id: OutputID) -> Option<ShareOutput>;

    fn get_contract(&self, id: ContractID) -> Option<FileContract>;
    fn put_contract(&mut self, id: ContractID, contract: FileContract);
    fn delete_contract(&mut self, id: ContractID) -> Option<FileContract>;

    fn path_at(&self, height: BlockHeight) -> Option<BlockID>;
    fn set_path(&mut self, height: BlockHeight, id: BlockID);
    /// Removes every path entry at or above `height`. Used when a reorg
    /// reverts back past `height`.
    fn truncate_path_from(&mut self, height: BlockHeight);

    fn get_stored_block(&self, id: BlockID) -> Option<StoredBlock>;
    fn put_stored_block(&mut self, id: BlockID, stored: StoredBlock);

    fn pool(&self) -> Currency;
    fn set_pool(&mut self, value: Currency);

    fn governance(&self) -> GovernancePair;
    fn set_governance(&mut self, pair: GovernancePair);

    fn delayed_bucket(&self, height: BlockHeight) -> Vec<(OutputID, CoinOutput)>;
    fn push_delayed(&mut self, height: BlockHeight, id: OutputID, output: CoinOutput);
    fn clear_delayed_bucket(&mut self, height: BlockHeight);

    fn expiry_bucket(&self, height: BlockHeight) -> Vec<ContractID>;
    fn push_expiry(&mut self, height: BlockHeight, id: ContractID);
    fn clear_expiry_bucket(&mut self, height: BlockHeight);

    /// Mirrors [`StateStore::all_coin_output_ids`] and its siblings, but
    /// over this transaction's own in-progress writes: the block applier
    /// needs the consistency checksum (§4.5) to cover the block it is in
    /// the middle of committing, not last block's committed view.
    fn all_coin_output_ids(&self) -> Vec<OutputID>;
    fn all_share_output_ids(&self) -> Vec<OutputID>;
    fn all_contract_ids(&self) -> Vec<ContractID>;

    /// Commits every mutation made through this handle atomically. No
    /// partial state from this transaction is ever observable by a
    /// reader before this returns `Ok`.
    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

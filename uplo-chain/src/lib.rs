//! Consensus-critical data types: IDs, currency, the two UTXO asset
//! classes, file contracts, transactions, blocks, and the deterministic
//! codec that gives every one of them a canonical encoding.
//!
//! Nothing in this crate talks to a store or validates state transitions;
//! it only defines what the entities *are* and how they serialize. See
//! `uplo-state` for the persistent store and diff algebra, and
//! `uplo-consensus` for validation, difficulty, and reorg.

pub mod block;
pub mod cached;
pub mod contract;
pub mod crypto;
pub mod currency;
pub mod derive;
pub mod governance;
pub mod ids;
pub mod outputs;
pub mod parameters;
pub mod primitives;
pub mod serialization;
pub mod transaction;
pub mod unlock;

pub use block::{Block, BlockHeader};
pub use currency::Currency;
pub use ids::{BlockID, ContractID, Hash, OutputID, TransactionID, UnlockHash};
pub use primitives::{BlockHeight, Target, Timestamp};
pub use transaction::Transaction;

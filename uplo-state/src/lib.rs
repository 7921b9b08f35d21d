//! The persistent consensus state store (C3) and its diff algebra (C4).
//!
//! This crate never validates anything — it only knows how to hold the
//! current best-chain state (unspent outputs of both asset classes, open
//! contracts, the dividend pool, the governance pair, the chain path, and
//! the block map) and how to apply or revert a block's worth of tagged
//! diffs against it under one write transaction. `uplo-consensus` is the
//! only caller that decides *which* diffs a block produces.

pub mod checksum;
pub mod config;
pub mod diff;
pub mod memory;
pub mod sled_backend;
pub mod store;

pub use config::Config;
pub use diff::{Diff, Direction};
pub use memory::MemoryStore;
pub use sled_backend::SledStore;
pub use store::{StateStore, StoreError, StoredBlock, WriteTransaction};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

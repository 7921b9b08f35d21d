//! Block-level validation and application (C6): [`check`] covers
//! everything that doesn't touch the store, [`apply`] covers the part
//! that does — transaction application and the per-block maintenance
//! pass (spec §4.5).

pub mod apply;
pub mod check;

pub use apply::{apply_block, AppliedBlock, BlockView};
pub use check::{block_valid, header_valid};

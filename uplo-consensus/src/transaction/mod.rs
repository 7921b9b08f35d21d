//! Transaction validation (C5): the checks that do not need a store view
//! ([`check`]) and the checks that do ([`stateful`]).

pub mod check;
pub mod stateful;

pub use check::standalone_valid;
pub use stateful::{stateful_valid, TransactionView};

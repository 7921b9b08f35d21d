//! The network-parameter envelope: every consensus constant the engine
//! needs, injected at construction instead of selected by a build-time
//! `cfg` switch. See [`NetworkParams`].

mod genesis;
mod network;

pub use genesis::genesis_block;
pub use network::{Network, NetworkParams};

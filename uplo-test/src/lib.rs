//! Shared test support (C14): `proptest` strategies, signing helpers, and
//! fixed golden vectors, so `uplo-chain`, `uplo-state`, and
//! `uplo-consensus` don't each reinvent fixture construction.
//!
//! Modeled on the teacher's `zebra-test` crate: a small, dependency-heavy
//! crate that every other workspace member only ever pulls in as a
//! dev-dependency.

pub mod merkle;
pub mod signer;
pub mod strategy;
pub mod vectors;

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a `color-eyre` panic/error hook and a `tracing` subscriber
/// that writes to the test harness's captured output. Idempotent and
/// safe to call at the top of every test in this workspace, mirroring
/// `zebra_test::init()`.
pub fn init() {
    INIT.call_once(|| {
        let _ = color_eyre::install();
        let subscriber = tracing_subscriber::fmt::Subscriber::builder()
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

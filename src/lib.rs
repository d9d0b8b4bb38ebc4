//! SPV relay, deposit-sweep maintainer, difficulty-epoch prover and
//! redemption-transaction assembler for a threshold-ECDSA Bitcoin bridge
//! node.
//!
//! This crate covers the chain-facing core: reading Bitcoin and the host
//! chain, proving deposit sweeps and difficulty epochs, and assembling
//! (unsigned) redemption transactions. Signing, broadcasting, and the
//! distributed key generation protocol are collaborators outside this
//! crate's scope.

pub mod bitcoin;
pub mod cli;
pub mod classifier;
pub mod config;
pub mod error;
pub mod host;
pub mod keys;
pub mod lister;
pub mod logging;
pub mod maintainer;
pub mod redemption;
#[cfg(test)]
pub mod testing;

/// Package version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

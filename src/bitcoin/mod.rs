//! Bitcoin-side primitives: hashes, headers, the read-only chain adapter
//! trait (C1), SPV proof assembly (C3), the redemption transaction
//! builder, and both a real node-backed and an in-memory implementation
//! of the chain adapter.

pub mod chain;
pub mod hash;
pub mod header;
pub mod local;
pub mod merkle;
pub mod rpc;
pub mod spv;
pub mod tx;

pub use chain::{BitcoinChain, MerkleProof};
pub use hash::BitcoinHash;
pub use header::BlockHeader;
pub use spv::{assemble_proof, SpvProof};

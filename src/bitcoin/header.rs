//! Bitcoin block headers and the proof-of-work / difficulty arithmetic
//! the SPV proof assembler and difficulty-epoch prover both rely on.

use bitcoin::hashes::Hash as _;
use bitcoin::pow::{CompactTarget, Target};
use bitcoin::params::Params;

use crate::bitcoin::hash::BitcoinHash;

/// The number of blocks between Bitcoin difficulty retarget boundaries.
pub const BLOCKS_PER_EPOCH: u32 = 2016;

/// An 80-byte Bitcoin block header, decomposed field-by-field as the
/// consensus wire format defines it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Block version bits.
    pub version: i32,
    /// Hash of the previous block header, natural byte order.
    pub prev_block_hash: BitcoinHash,
    /// Root of the Merkle tree of this block's transactions, natural
    /// byte order.
    pub merkle_root_hash: BitcoinHash,
    /// Block timestamp, Unix epoch seconds.
    pub time: u32,
    /// Compact-encoded difficulty target ("nBits").
    pub bits: u32,
    /// Proof-of-work nonce.
    pub nonce: u32,
}

impl BlockHeader {
    /// Computes this header's own double-SHA256 hash, i.e. the block
    /// hash that would appear as the `prev_block_hash` of the next
    /// header in the chain.
    pub fn block_hash(&self) -> BitcoinHash {
        let header = self.to_consensus_header();
        BitcoinHash::from(header.block_hash())
    }

    /// Converts to the real `bitcoin` crate's consensus header type, for
    /// reuse of its (de)serialization and hashing.
    pub fn to_consensus_header(&self) -> bitcoin::block::Header {
        bitcoin::block::Header {
            version: bitcoin::block::Version::from_consensus(self.version),
            prev_blockhash: self.prev_block_hash.into(),
            merkle_root: bitcoin::TxMerkleNode::from_byte_array(
                self.merkle_root_hash.natural_bytes(),
            ),
            time: self.time,
            bits: CompactTarget::from_consensus(self.bits),
            nonce: self.nonce,
        }
    }

    /// The proof-of-work target this header's bits decode to.
    pub fn target(&self) -> Target {
        Target::from_compact(CompactTarget::from_consensus(self.bits))
    }

    /// Whether this header's hash is numerically below the target its
    /// own bits decode to, i.e. whether the header carries valid
    /// proof-of-work. This is invariant 2 of the SPV proof contract.
    pub fn has_valid_pow(&self) -> bool {
        self.target().is_met_by(self.to_consensus_header().block_hash())
    }

    /// The conventional Bitcoin "difficulty" this header's bits
    /// represent: the ratio of the difficulty-1 target to this header's
    /// target. Used only for human-facing reporting; on-chain epoch
    /// matching (invariant 3 of the SPV proof contract) compares the raw
    /// compact bits value instead, since that is what the difficulty
    /// relay itself stores per submitted header.
    pub fn difficulty(&self, params: &Params) -> u128 {
        self.target().difficulty(params)
    }
}

/// Checks that every header in `headers` links to the previous one by
/// hash, i.e. `headers[i].prev_block_hash == headers[i - 1].block_hash()`
/// for all `i > 0`. This is invariant 1 of the SPV proof contract.
pub fn headers_link(headers: &[BlockHeader]) -> bool {
    headers
        .windows(2)
        .all(|pair| pair[1].prev_block_hash == pair[0].block_hash())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_with_bits(bits: u32) -> BlockHeader {
        BlockHeader {
            version: 0,
            prev_block_hash: BitcoinHash::from_natural_bytes([0; 32]),
            merkle_root_hash: BitcoinHash::from_natural_bytes([0; 32]),
            time: 1_000_000,
            bits,
            nonce: 0,
        }
    }

    #[test]
    fn chain_of_headers_links_by_hash() {
        let mut genesis = header_with_bits(0x1d00ffff);
        genesis.nonce = 1;
        let mut next = header_with_bits(0x1d00ffff);
        next.prev_block_hash = genesis.block_hash();
        next.nonce = 2;

        assert!(headers_link(&[genesis, next]));
    }

    #[test]
    fn broken_chain_is_rejected() {
        let genesis = header_with_bits(0x1d00ffff);
        let mut next = header_with_bits(0x1d00ffff);
        next.prev_block_hash = BitcoinHash::from_natural_bytes([0xff; 32]);

        assert!(!headers_link(&[genesis, next]));
    }
}

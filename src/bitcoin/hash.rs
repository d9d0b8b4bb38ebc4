//! A 32-byte Bitcoin hash with two explicitly-named string encodings.
//!
//! Bitcoin hashes (transaction IDs, block hashes, Merkle roots) are
//! computed and serialized internally in one byte order but are almost
//! universally displayed to humans, and by block explorers, in the
//! reverse order. Defaulting to either encoding silently is a classic
//! source of bugs, so this type never implements [`std::fmt::Display`]
//! and instead exposes two named conversions.

use std::fmt;

use bitcoin::hashes::Hash as _;
use bitcoin::{BlockHash, Txid};

/// A 32-byte hash used for both transaction IDs and block hashes.
///
/// The internal representation is the *natural* (consensus/internal)
/// byte order: the same order used in the Bitcoin wire protocol and in
/// block headers' `prev_blockhash` field.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BitcoinHash([u8; 32]);

impl BitcoinHash {
    /// Wraps raw bytes that are already in natural byte order.
    pub const fn from_natural_bytes(bytes: [u8; 32]) -> Self {
        BitcoinHash(bytes)
    }

    /// Returns the raw bytes in natural byte order.
    pub const fn natural_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Hex-encodes the hash in natural (internal) byte order. This is the
    /// orientation used in all on-wire and on-chain contexts.
    pub fn natural_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Hex-encodes the hash in reversed (block-explorer) byte order. This
    /// is the orientation used for user-facing logging only.
    pub fn reversed_hex(&self) -> String {
        let mut reversed = self.0;
        reversed.reverse();
        hex::encode(reversed)
    }

    /// Parses a hex string that is already in natural byte order.
    pub fn from_natural_hex(s: &str) -> Result<Self, HashParseError> {
        Self::parse_hex(s).map(BitcoinHash)
    }

    /// Parses a hex string that is in reversed (block-explorer) byte
    /// order, un-reversing it back to the natural encoding used
    /// internally.
    pub fn from_reversed_hex(s: &str) -> Result<Self, HashParseError> {
        let mut bytes = Self::parse_hex(s)?;
        bytes.reverse();
        Ok(BitcoinHash(bytes))
    }

    fn parse_hex(s: &str) -> Result<[u8; 32], HashParseError> {
        let decoded = hex::decode(s).map_err(|_| HashParseError)?;
        decoded.try_into().map_err(|_| HashParseError)
    }
}

impl fmt::Debug for BitcoinHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Debug output intentionally uses the reversed orientation since
        // it is only ever read by a human during development.
        write!(f, "BitcoinHash({})", self.reversed_hex())
    }
}

/// Failure parsing a hex-encoded [`BitcoinHash`]: wrong length or invalid
/// hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid 32-byte hex hash")]
pub struct HashParseError;

impl From<Txid> for BitcoinHash {
    fn from(txid: Txid) -> Self {
        BitcoinHash(txid.to_byte_array())
    }
}

impl From<BitcoinHash> for Txid {
    fn from(hash: BitcoinHash) -> Self {
        Txid::from_byte_array(hash.0)
    }
}

impl From<BlockHash> for BitcoinHash {
    fn from(hash: BlockHash) -> Self {
        BitcoinHash(hash.to_byte_array())
    }
}

impl From<BitcoinHash> for BlockHash {
    fn from(hash: BitcoinHash) -> Self {
        BlockHash::from_byte_array(hash.0)
    }
}

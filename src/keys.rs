//! Wallet public-key-hash identifiers and the small amount of key-derived
//! script logic the redemption assembler needs.

use std::fmt;

use bitcoin::hashes::{hash160, Hash as _};
use bitcoin::key::UncompressedPublicKeyError;
use bitcoin::{CompressedPublicKey, PublicKey, ScriptBuf};

/// A 20-byte hash identifying a wallet across both the Bitcoin and host
/// chains: `RIPEMD160(SHA256(compressed_public_key))`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WalletPublicKeyHash([u8; 20]);

impl WalletPublicKeyHash {
    /// Wraps a raw 20-byte hash.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        WalletPublicKeyHash(bytes)
    }

    /// Returns the raw 20-byte hash.
    pub const fn as_bytes(&self) -> [u8; 20] {
        self.0
    }

    /// Derives the wallet public-key hash from a wallet's public key, the
    /// same `hash160` construction used for Bitcoin P2WPKH/P2PKH scripts.
    pub fn from_public_key(public_key: &PublicKey) -> Result<Self, UncompressedPublicKeyError> {
        let compressed = CompressedPublicKey::try_from(*public_key)?;
        Ok(WalletPublicKeyHash(compressed.pubkey_hash().to_byte_array()))
    }

    /// Lowercase hex encoding, used for logging and as a map key.
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// Parses a lowercase (or uppercase) hex-encoded 20-byte hash.
    pub fn from_hex(s: &str) -> Result<Self, WalletPublicKeyHashParseError> {
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|_| WalletPublicKeyHashParseError)?;
        let array: [u8; 20] = bytes.try_into().map_err(|_| WalletPublicKeyHashParseError)?;
        Ok(WalletPublicKeyHash(array))
    }
}

impl fmt::Debug for WalletPublicKeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Display for WalletPublicKeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

/// Failure parsing a hex-encoded [`WalletPublicKeyHash`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid 20-byte wallet public key hash")]
pub struct WalletPublicKeyHashParseError;

/// Builds the P2WPKH `scriptPubKey` redemption change outputs pay back
/// to, from the wallet's uncompressed public key.
pub fn pay_to_witness_public_key_hash(
    public_key: &PublicKey,
) -> Result<ScriptBuf, UncompressedPublicKeyError> {
    let compressed = CompressedPublicKey::try_from(*public_key)?;
    Ok(ScriptBuf::new_p2wpkh(&compressed.wpubkey_hash()))
}

/// Builds the P2WPKH `scriptPubKey` a wallet public key hash pays to,
/// without needing the public key itself. Used to recognize a wallet's
/// own outputs when scanning the chain for its transactions.
pub fn script_for_public_key_hash(hash: WalletPublicKeyHash) -> ScriptBuf {
    let wpkh = bitcoin::WPubkeyHash::from_byte_array(hash.as_bytes());
    ScriptBuf::new_p2wpkh(&wpkh)
}

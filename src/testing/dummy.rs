//! Utilities for generating dummy values on external types, used to keep
//! test setup short without pulling in a full property-testing harness.

use bitcoin::hashes::Hash as _;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};

use crate::bitcoin::hash::BitcoinHash;
use crate::bitcoin::header::BlockHeader;
use crate::keys::WalletPublicKeyHash;

/// A txid derived deterministically from a single seed byte, for tests
/// that need a stable but distinguishable identifier.
pub fn txid(seed: u8) -> Txid {
    Txid::from_byte_array([seed; 32])
}

/// A block hash derived deterministically from a single seed byte.
pub fn block_hash(seed: u8) -> BitcoinHash {
    BitcoinHash::from_natural_bytes([seed; 32])
}

/// A wallet public key hash derived deterministically from a single seed
/// byte.
pub fn wallet_public_key_hash(seed: u8) -> WalletPublicKeyHash {
    WalletPublicKeyHash::from_bytes([seed; 20])
}

/// A transaction spending the given outpoints and paying to
/// `output_count` dummy P2WPKH outputs of one satoshi each.
pub fn transaction(inputs: &[OutPoint], output_count: usize) -> Transaction {
    let input = inputs
        .iter()
        .map(|outpoint| TxIn {
            previous_output: *outpoint,
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ZERO,
            witness: Witness::new(),
        })
        .collect();

    let output = (0..output_count)
        .map(|_| TxOut { value: Amount::from_sat(1), script_pubkey: ScriptBuf::new() })
        .collect();

    Transaction {
        version: bitcoin::transaction::Version::TWO,
        lock_time: bitcoin::absolute::LockTime::ZERO,
        input,
        output,
    }
}

/// A block header with the given compact-bits value and an otherwise
/// arbitrary but stable body, suitable as a chain-of-headers fixture.
pub fn block_header(bits: u32, nonce: u32) -> BlockHeader {
    BlockHeader {
        version: 0,
        prev_block_hash: BitcoinHash::from_natural_bytes([0; 32]),
        merkle_root_hash: BitcoinHash::from_natural_bytes([0; 32]),
        time: 1_000_000,
        bits,
        nonce,
    }
}

//! The Bitcoin-chain adapter trait (C1): read-only access to block
//! headers, transactions and confirmations, plus Merkle inclusion
//! proofs. Implementations talk to a real Bitcoin Core node (`rpc`) or,
//! in tests, an in-memory fixture (`local`).

use std::future::Future;

use bitcoin::{Transaction, Txid};

use crate::bitcoin::header::BlockHeader;
use crate::error::Result;
use crate::keys::WalletPublicKeyHash;

/// A Merkle inclusion proof for a single transaction within a block: the
/// total transaction count, the branch of sibling hashes from leaf to
/// root, and the leaf's position (which implies each sibling's side).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    /// Number of transactions in the block this proof was taken from.
    pub transaction_count: u32,
    /// Sibling hashes along the path from the leaf to the root, in
    /// natural byte order, ordered root-ward.
    pub merkle_branch: Vec<crate::bitcoin::hash::BitcoinHash>,
    /// Zero-indexed position of the transaction within the block.
    pub position: u32,
}

/// Read-only access to the Bitcoin blockchain.
///
/// This is the core's only window into Bitcoin; it never signs or
/// broadcasts anything. Every method that fails due to a missing
/// transaction, block, or confirmation should return
/// [`crate::error::Error::MissingTransaction`] /
/// [`crate::error::Error::MissingBlockHeader`], keeping pure transport
/// failures distinguishable in [`crate::error::Error::BitcoinChainIo`].
pub trait BitcoinChain: Send + Sync {
    /// Fetches a transaction by its ID.
    fn get_transaction(&self, txid: Txid) -> impl Future<Output = Result<Transaction>> + Send;

    /// Returns the number of confirmations a transaction has
    /// accumulated, or an error if it is unknown to this node.
    fn get_transaction_confirmations(
        &self,
        txid: Txid,
    ) -> impl Future<Output = Result<u32>> + Send;

    /// Returns up to `limit` confirmed transactions that pay to the
    /// given wallet public key hash, most-recent-first.
    fn get_transactions_for_public_key_hash(
        &self,
        wallet_public_key_hash: WalletPublicKeyHash,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Transaction>>> + Send;

    /// Fetches the block header at the given height.
    fn get_block_header(&self, height: u32) -> impl Future<Output = Result<BlockHeader>> + Send;

    /// Returns the height of the block containing `txid`, if it is
    /// confirmed.
    fn get_transaction_block_height(
        &self,
        txid: Txid,
    ) -> impl Future<Output = Result<u32>> + Send;

    /// Builds the Merkle inclusion proof for `txid` within the block at
    /// `block_height`.
    fn get_merkle_proof(
        &self,
        txid: Txid,
        block_height: u32,
    ) -> impl Future<Output = Result<MerkleProof>> + Send;
}

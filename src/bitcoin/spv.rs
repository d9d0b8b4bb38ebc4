//! SPV proof assembler (C3): given a transaction hash and a required
//! confirmation count, produces the Merkle inclusion proof plus the
//! chain of consecutive block headers a receiving chain needs to accept
//! the transaction as proven.

use bitcoin::{Transaction, Txid};

use crate::bitcoin::chain::{BitcoinChain, MerkleProof};
use crate::bitcoin::header::{headers_link, BlockHeader};
use crate::error::{Error, Result};

/// An SPV proof: the Merkle path of a transaction within its containing
/// block, plus the `N` consecutive block headers starting at that
/// block, where `N` is the number of confirmations the proof attests
/// to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpvProof {
    /// Merkle inclusion proof for the transaction within `headers[0]`.
    pub merkle_proof: MerkleProof,
    /// `N` consecutive headers, starting at the block containing the
    /// transaction.
    pub headers: Vec<BlockHeader>,
}

impl SpvProof {
    /// The compact-bits value of the first header in the proof. Used by
    /// the sweep-proving loop to check that the proof's starting epoch
    /// matches the on-chain current or previous difficulty before
    /// submitting (§4.5).
    pub fn first_block_header_bits(&self) -> u32 {
        self.headers[0].bits
    }

    /// Every header links to the previous by hash, and every header
    /// carries valid proof-of-work for its own encoded bits. This is
    /// invariants 1 and 2 of the SPV proof contract; invariant 3
    /// (difficulty-epoch match) is checked by the caller against the
    /// on-chain current/previous difficulty, since this type has no
    /// access to the host chain.
    pub fn headers_are_well_formed(&self) -> bool {
        headers_link(&self.headers) && self.headers.iter().all(BlockHeader::has_valid_pow)
    }
}

/// Fetches `txid`, locates its containing block, and assembles an
/// [`SpvProof`] spanning `required_confirmations` consecutive headers
/// starting at that block.
///
/// Fails if `required_confirmations == 0`, if the transaction is
/// unconfirmed, or if any of the required headers are missing.
pub async fn assemble_proof<C: BitcoinChain>(
    chain: &C,
    txid: Txid,
    required_confirmations: u32,
) -> Result<(Transaction, SpvProof)> {
    if required_confirmations == 0 {
        return Err(Error::ZeroConfirmationsRequested);
    }

    let transaction = chain.get_transaction(txid).await?;

    let confirmations = chain.get_transaction_confirmations(txid).await?;
    if confirmations == 0 {
        return Err(Error::UnconfirmedTransaction(txid));
    }

    let block_height = chain.get_transaction_block_height(txid).await?;

    let mut headers = Vec::with_capacity(required_confirmations as usize);
    for offset in 0..required_confirmations {
        let header = chain.get_block_header(block_height + offset).await?;
        headers.push(header);
    }

    let merkle_proof = chain.get_merkle_proof(txid, block_height).await?;

    Ok((transaction, SpvProof { merkle_proof, headers }))
}

//! Deposit lister (C8): a read-only join between revealed-deposit events
//! and their request state, for operator-facing reporting. Talks only to
//! [`HostChain`]; never touches Bitcoin.

use sha3::{Digest, Keccak256};
use time::OffsetDateTime;

use crate::error::Result;
use crate::host::{DepositRequest, HostChain};
use crate::keys::WalletPublicKeyHash;

/// One row of the deposit listing: a revealed deposit joined with its
/// current request state.
#[derive(Debug, Clone, PartialEq)]
pub struct DepositListing {
    /// `0x`-prefixed lowercase hex of `keccak256(funding_tx_hash ‖
    /// be32(output_index))`, stable across sweeps.
    pub deposit_key: String,
    pub wallet_public_key_hash: WalletPublicKeyHash,
    pub amount: bitcoin::Amount,
    pub revealed_at: OffsetDateTime,
    pub is_swept: bool,
}

/// Lists deposits revealed on the host chain, optionally scoped to a
/// single wallet and optionally hiding already-swept deposits.
///
/// Rows are sorted by reveal block descending, then by amount
/// descending within a block.
pub async fn list_deposits<H: HostChain>(
    host_chain: &H,
    wallet_public_key_hash: Option<WalletPublicKeyHash>,
    hide_swept: bool,
) -> Result<Vec<DepositListing>> {
    let events = host_chain.past_deposit_revealed_events(wallet_public_key_hash).await?;

    let mut rows = Vec::with_capacity(events.len());

    for event in &events {
        let request = host_chain.get_deposit_request(event.funding_outpoint).await?;
        let Some(request) = request else { continue };

        if hide_swept && request.is_swept() {
            continue;
        }

        rows.push((
            event.block_number,
            DepositListing {
                deposit_key: deposit_key(&request),
                wallet_public_key_hash: request.wallet_public_key_hash,
                amount: request.amount,
                revealed_at: request.revealed_at,
                is_swept: request.is_swept(),
            },
        ));
    }

    rows.sort_by(|(a_block, a), (b_block, b)| {
        b_block.cmp(a_block).then_with(|| b.amount.cmp(&a.amount))
    });

    Ok(rows.into_iter().map(|(_, row)| row).collect())
}

fn deposit_key(request: &DepositRequest) -> String {
    let mut hasher = Keccak256::new();
    hasher.update(
        crate::bitcoin::hash::BitcoinHash::from(request.funding_outpoint.txid).natural_bytes(),
    );
    hasher.update(request.funding_outpoint.vout.to_be_bytes());
    let digest: [u8; 32] = hasher.finalize().into();
    format!("0x{}", hex::encode(digest))
}

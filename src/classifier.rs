//! Deposit-sweep classifier (C4): decides whether a Bitcoin transaction
//! is an unproven deposit sweep for a given wallet.

use bitcoin::Transaction;

use crate::bitcoin::chain::BitcoinChain;
use crate::bitcoin::tx::UnspentOutput;
use crate::error::Result;
use crate::host::HostChain;
use crate::keys::WalletPublicKeyHash;

/// Decides whether `transaction` is an unproven deposit sweep for
/// `wallet_public_key_hash`.
///
/// Rules, applied in order; any rule returning `false` terminates early:
/// 1. The transaction must have exactly one output.
/// 2. Every input must be either a currently-unswept deposit of this
///    wallet, or the wallet's current main UTXO. A swept deposit input
///    means the sweep was already proven; anything else disqualifies the
///    transaction.
/// 3. At least one input must be a deposit (otherwise this is some other
///    transaction type that happens to spend the main UTXO, e.g. a
///    redemption).
///
/// At most one input can match the main-UTXO hash, since the hash is a
/// commitment; input order is insignificant.
pub async fn is_unproven_deposit_sweep<B, H>(
    bitcoin_chain: &B,
    host_chain: &H,
    transaction: &Transaction,
    wallet_public_key_hash: WalletPublicKeyHash,
) -> Result<bool>
where
    B: BitcoinChain,
    H: HostChain,
{
    if transaction.output.len() != 1 {
        return Ok(false);
    }

    let mut has_deposit_input = false;

    for input in &transaction.input {
        let outpoint = input.previous_output;

        match host_chain.get_deposit_request(outpoint).await? {
            Some(deposit) if !deposit.is_swept() => has_deposit_input = true,
            Some(_swept) => return Ok(false),
            None => {
                if !is_current_wallet_main_utxo(
                    bitcoin_chain,
                    host_chain,
                    outpoint,
                    wallet_public_key_hash,
                )
                .await?
                {
                    return Ok(false);
                }
            }
        }
    }

    Ok(has_deposit_input)
}

async fn is_current_wallet_main_utxo<B, H>(
    bitcoin_chain: &B,
    host_chain: &H,
    outpoint: bitcoin::OutPoint,
    wallet_public_key_hash: WalletPublicKeyHash,
) -> Result<bool>
where
    B: BitcoinChain,
    H: HostChain,
{
    let funding_transaction = bitcoin_chain.get_transaction(outpoint.txid).await?;
    let funding_output_value = funding_transaction.output[outpoint.vout as usize].value;

    let main_utxo_hash =
        host_chain.compute_main_utxo_hash(UnspentOutput { outpoint, value: funding_output_value });

    let wallet = host_chain.get_wallet(wallet_public_key_hash).await?;

    Ok(main_utxo_hash == wallet.main_utxo_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash as _;
    use bitcoin::{Amount, OutPoint, Txid};
    use time::OffsetDateTime;

    use crate::bitcoin::local::LocalBitcoinChain;
    use crate::host::{unswept_sentinel, LocalHostChain, Wallet, WalletState};
    use crate::testing::dummy;

    fn live_wallet(wpkh: WalletPublicKeyHash, main_utxo_hash: [u8; 32]) -> Wallet {
        Wallet { public_key_hash: wpkh, state: WalletState::Live, main_utxo_hash }
    }

    #[tokio::test]
    async fn pure_deposit_sweep_is_classified_true() {
        let bitcoin_chain = LocalBitcoinChain::new();
        let host_chain = LocalHostChain::new();
        let wallet = dummy::wallet_public_key_hash(1);
        host_chain.set_wallet(live_wallet(wallet, [0; 32]));

        let deposit_outpoint_1 = OutPoint::new(dummy::txid(10), 0);
        let deposit_outpoint_2 = OutPoint::new(dummy::txid(11), 1);

        for outpoint in [deposit_outpoint_1, deposit_outpoint_2] {
            host_chain.set_deposit_request(crate::host::DepositRequest {
                funding_outpoint: outpoint,
                amount: Amount::from_sat(10_000),
                revealed_at: OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(1),
                swept_at: unswept_sentinel(),
                wallet_public_key_hash: wallet,
                vault: None,
            });
        }

        let sweep_tx = dummy::transaction(&[deposit_outpoint_1, deposit_outpoint_2], 1);

        assert!(is_unproven_deposit_sweep(&bitcoin_chain, &host_chain, &sweep_tx, wallet)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn sweep_with_main_utxo_input_is_classified_true() {
        let bitcoin_chain = LocalBitcoinChain::new();
        let host_chain = LocalHostChain::new();
        let wallet = dummy::wallet_public_key_hash(2);

        let main_utxo_funding_tx = dummy::transaction(&[], 1);
        let main_utxo_outpoint = OutPoint::new(main_utxo_funding_tx.compute_txid(), 0);
        bitcoin_chain.insert_confirmed_transaction(main_utxo_funding_tx.clone(), 10, 6, None);

        let main_utxo_value = main_utxo_funding_tx.output[0].value;
        let main_utxo_hash = crate::host::compute_main_utxo_hash(UnspentOutput {
            outpoint: main_utxo_outpoint,
            value: main_utxo_value,
        });
        host_chain.set_wallet(live_wallet(wallet, main_utxo_hash));

        let deposit_outpoint = OutPoint::new(dummy::txid(20), 0);
        host_chain.set_deposit_request(crate::host::DepositRequest {
            funding_outpoint: deposit_outpoint,
            amount: Amount::from_sat(10_000),
            revealed_at: OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(1),
            swept_at: unswept_sentinel(),
            wallet_public_key_hash: wallet,
            vault: None,
        });

        let sweep_tx = dummy::transaction(&[deposit_outpoint, main_utxo_outpoint], 1);

        assert!(is_unproven_deposit_sweep(&bitcoin_chain, &host_chain, &sweep_tx, wallet)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn already_proven_sweep_is_classified_false() {
        let bitcoin_chain = LocalBitcoinChain::new();
        let host_chain = LocalHostChain::new();
        let wallet = dummy::wallet_public_key_hash(3);
        host_chain.set_wallet(live_wallet(wallet, [0; 32]));

        let unswept_outpoint = OutPoint::new(dummy::txid(30), 0);
        let swept_outpoint = OutPoint::new(dummy::txid(31), 0);

        host_chain.set_deposit_request(crate::host::DepositRequest {
            funding_outpoint: unswept_outpoint,
            amount: Amount::from_sat(10_000),
            revealed_at: OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(1),
            swept_at: unswept_sentinel(),
            wallet_public_key_hash: wallet,
            vault: None,
        });
        host_chain.set_deposit_request(crate::host::DepositRequest {
            funding_outpoint: swept_outpoint,
            amount: Amount::from_sat(10_000),
            revealed_at: OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(1),
            swept_at: OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(1000),
            wallet_public_key_hash: wallet,
            vault: None,
        });

        let sweep_tx = dummy::transaction(&[unswept_outpoint, swept_outpoint], 1);

        assert!(!is_unproven_deposit_sweep(&bitcoin_chain, &host_chain, &sweep_tx, wallet)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn multiple_outputs_is_never_a_sweep() {
        let bitcoin_chain = LocalBitcoinChain::new();
        let host_chain = LocalHostChain::new();
        let wallet = dummy::wallet_public_key_hash(4);

        let deposit_outpoint = OutPoint::new(dummy::txid(40), 0);
        host_chain.set_deposit_request(crate::host::DepositRequest {
            funding_outpoint: deposit_outpoint,
            amount: Amount::from_sat(10_000),
            revealed_at: OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(1),
            swept_at: unswept_sentinel(),
            wallet_public_key_hash: wallet,
            vault: None,
        });

        let tx = dummy::transaction(&[deposit_outpoint], 2);

        assert!(!is_unproven_deposit_sweep(&bitcoin_chain, &host_chain, &tx, wallet)
            .await
            .unwrap());
    }
}

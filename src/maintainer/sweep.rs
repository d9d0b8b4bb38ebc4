//! Sweep-proving control loop (C5): discovers candidate deposit-sweep
//! transactions, builds SPV proofs for them, and submits the proofs to
//! the host chain, retrying and backing off on error.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::bitcoin::chain::BitcoinChain;
use crate::bitcoin::spv;
use crate::bitcoin::tx::UnspentOutput;
use crate::classifier::is_unproven_deposit_sweep;
use crate::error::Result;
use crate::host::HostChain;
use crate::keys::WalletPublicKeyHash;

/// How far back in host-chain blocks, and how many Bitcoin transactions
/// per wallet, a sweep-proving cycle scans.
pub struct SweepMaintainerConfig {
    /// How many host-chain blocks back to scan for sweep proposals.
    pub history_depth: u64,
    /// Max Bitcoin transactions fetched per wallet in one cycle.
    pub transaction_limit: u32,
    /// Sleep after an outer error before re-entering the inner loop.
    pub restart_backoff_time: Duration,
    /// Sleep between successful inner cycles.
    pub idle_backoff_time: Duration,
}

/// Drives the sweep-proving loop (C5) against a Bitcoin-chain and
/// host-chain adapter pair.
pub struct SweepMaintainer<B, H> {
    bitcoin_chain: B,
    host_chain: H,
    config: SweepMaintainerConfig,
}

impl<B, H> SweepMaintainer<B, H>
where
    B: BitcoinChain,
    H: HostChain,
{
    /// Builds a new sweep maintainer.
    pub fn new(bitcoin_chain: B, host_chain: H, config: SweepMaintainerConfig) -> Self {
        SweepMaintainer { bitcoin_chain, host_chain, config }
    }

    /// Runs the outer restart loop until `cancellation` fires.
    pub async fn run(&self, cancellation: &CancellationToken) {
        tracing::info!("starting sweep maintainer");

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => break,
                result = self.maintain_sweeps(cancellation) => {
                    if let Err(error) = result {
                        tracing::error!(%error, "error while maintaining deposit sweeps; restarting maintainer");
                        tokio::select! {
                            _ = cancellation.cancelled() => break,
                            _ = tokio::time::sleep(self.config.restart_backoff_time) => {}
                        }
                    }
                }
            }
        }

        tracing::info!("stopping sweep maintainer");
    }

    async fn maintain_sweeps(&self, cancellation: &CancellationToken) -> Result<()> {
        loop {
            self.prove_deposit_sweep_transactions().await?;

            tokio::select! {
                _ = cancellation.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.config.idle_backoff_time) => {}
            }
        }
    }

    /// Runs a single cycle: discovers unproven sweeps, proves the ones
    /// with sufficient confirmations and a difficulty epoch the relay
    /// already knows about, and submits them.
    async fn prove_deposit_sweep_transactions(&self) -> Result<()> {
        let candidates = self.unproven_deposit_sweep_transactions().await?;
        tracing::info!(count = candidates.len(), "found unproven deposit sweep transaction(s)");

        let required_confirmations = self.host_chain.tx_proof_difficulty_factor().await?;
        let (current_difficulty, previous_difficulty) =
            self.host_chain.get_current_and_prev_epoch_difficulty().await?;

        for (transaction, wallet_public_key_hash) in candidates {
            let txid = transaction.compute_txid();
            let reversed = crate::bitcoin::hash::BitcoinHash::from(txid).reversed_hex();

            let confirmations =
                self.bitcoin_chain.get_transaction_confirmations(txid).await?;
            if confirmations < required_confirmations {
                tracing::info!(tx = %reversed, "skipped proving sweep, not enough confirmations yet");
                continue;
            }

            let (_, proof) =
                spv::assemble_proof(&self.bitcoin_chain, txid, required_confirmations).await?;

            let first_header_bits = proof.first_block_header_bits() as u128;
            if first_header_bits != current_difficulty && first_header_bits != previous_difficulty {
                tracing::warn!(
                    tx = %reversed,
                    "skipped proving sweep, proof difficulty matches neither current nor previous epoch"
                );
                continue;
            }

            let (main_utxo, vault) =
                self.parse_sweep_transaction_inputs(&transaction, wallet_public_key_hash).await?;

            self.host_chain
                .submit_deposit_sweep_proof_with_reimbursement(transaction, proof, main_utxo, vault)
                .await?;

            tracing::info!(tx = %reversed, "submitted deposit sweep proof");
        }

        tracing::info!("finished round of proving deposit sweep transactions");
        Ok(())
    }

    async fn unproven_deposit_sweep_transactions(
        &self,
    ) -> Result<Vec<(bitcoin::Transaction, WalletPublicKeyHash)>> {
        let current_block = self.host_chain.current_block().await?;
        let start_block = current_block.saturating_sub(self.config.history_depth);

        let events =
            self.host_chain.past_deposit_sweep_proposal_submitted_events(start_block).await?;
        let wallet_public_key_hashes = unique_wallet_public_key_hashes(&events);

        let mut candidates = Vec::new();

        for wallet_public_key_hash in wallet_public_key_hashes {
            let wallet = self.host_chain.get_wallet(wallet_public_key_hash).await?;
            if !wallet.state.can_submit_sweep_proofs() {
                tracing::info!(
                    wallet = %wallet_public_key_hash,
                    state = ?wallet.state,
                    "skipped wallet, not live or moving funds"
                );
                continue;
            }

            let transactions = self
                .bitcoin_chain
                .get_transactions_for_public_key_hash(
                    wallet_public_key_hash,
                    self.config.transaction_limit,
                )
                .await?;

            for transaction in transactions {
                if is_unproven_deposit_sweep(
                    &self.bitcoin_chain,
                    &self.host_chain,
                    &transaction,
                    wallet_public_key_hash,
                )
                .await?
                {
                    candidates.push((transaction, wallet_public_key_hash));
                }
            }
        }

        Ok(candidates)
    }

    /// Parses a sweep transaction's inputs to recover the previous main
    /// UTXO it consumes, if any, and the vault to credit. A wallet's
    /// first sweep has no main UTXO input (its `main_utxo_hash` is
    /// all-zero), so the main UTXO is `None` rather than an error in
    /// that case. The vault is read off whichever deposit input carries
    /// one; a sweep's deposit inputs all belong to the same proposal and
    /// so share a vault.
    async fn parse_sweep_transaction_inputs(
        &self,
        transaction: &bitcoin::Transaction,
        wallet_public_key_hash: WalletPublicKeyHash,
    ) -> Result<(Option<UnspentOutput>, crate::host::Vault)> {
        let wallet = self.host_chain.get_wallet(wallet_public_key_hash).await?;

        let mut main_utxo = None;
        let mut vault = None;

        for input in &transaction.input {
            let outpoint = input.previous_output;

            if let Some(deposit) = self.host_chain.get_deposit_request(outpoint).await? {
                if vault.is_none() {
                    vault = deposit.vault;
                }
                continue;
            }

            let funding_transaction = self.bitcoin_chain.get_transaction(outpoint.txid).await?;
            let value = funding_transaction.output[outpoint.vout as usize].value;
            let utxo = UnspentOutput { outpoint, value };
            if self.host_chain.compute_main_utxo_hash(utxo) == wallet.main_utxo_hash {
                main_utxo = Some(utxo);
            }
        }

        Ok((main_utxo, vault))
    }
}

/// Deduplicates the wallet public key hashes referenced by `events`,
/// preserving first-seen order.
fn unique_wallet_public_key_hashes(
    events: &[crate::host::DepositSweepProposalSubmittedEvent],
) -> Vec<WalletPublicKeyHash> {
    let mut seen = std::collections::HashSet::new();
    let mut ordered = Vec::new();

    for event in events {
        if seen.insert(event.wallet_public_key_hash) {
            ordered.push(event.wallet_public_key_hash);
        }
    }

    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::Amount;
    use time::OffsetDateTime;

    use crate::bitcoin::local::LocalBitcoinChain;
    use crate::host::{unswept_sentinel, DepositRequest, LocalHostChain, Wallet, WalletState};
    use crate::testing::dummy;

    #[test]
    fn dedup_preserves_first_seen_order() {
        let a = crate::testing::dummy::wallet_public_key_hash(1);
        let b = crate::testing::dummy::wallet_public_key_hash(2);

        let events = vec![
            crate::host::DepositSweepProposalSubmittedEvent { wallet_public_key_hash: b, block_number: 1 },
            crate::host::DepositSweepProposalSubmittedEvent { wallet_public_key_hash: a, block_number: 2 },
            crate::host::DepositSweepProposalSubmittedEvent { wallet_public_key_hash: b, block_number: 3 },
        ];

        assert_eq!(unique_wallet_public_key_hashes(&events), vec![b, a]);
    }

    fn maintainer(
        bitcoin_chain: LocalBitcoinChain,
        host_chain: LocalHostChain,
    ) -> SweepMaintainer<LocalBitcoinChain, LocalHostChain> {
        SweepMaintainer::new(
            bitcoin_chain,
            host_chain,
            SweepMaintainerConfig {
                history_depth: 0,
                transaction_limit: 0,
                restart_backoff_time: Duration::ZERO,
                idle_backoff_time: Duration::ZERO,
            },
        )
    }

    #[tokio::test]
    async fn pure_deposit_sweep_has_no_main_utxo_but_recovers_vault() {
        let bitcoin_chain = LocalBitcoinChain::new();
        let host_chain = LocalHostChain::new();
        let wallet = dummy::wallet_public_key_hash(10);
        host_chain.set_wallet(Wallet {
            public_key_hash: wallet,
            state: WalletState::Live,
            main_utxo_hash: [0; 32],
        });

        let deposit_outpoint = bitcoin::OutPoint::new(dummy::txid(50), 0);
        host_chain.set_deposit_request(DepositRequest {
            funding_outpoint: deposit_outpoint,
            amount: Amount::from_sat(10_000),
            revealed_at: OffsetDateTime::UNIX_EPOCH,
            swept_at: unswept_sentinel(),
            wallet_public_key_hash: wallet,
            vault: Some([7; 20]),
        });

        let sweep_tx = dummy::transaction(&[deposit_outpoint], 1);

        let maintainer = maintainer(bitcoin_chain, host_chain);
        let (main_utxo, vault) =
            maintainer.parse_sweep_transaction_inputs(&sweep_tx, wallet).await.unwrap();

        assert_eq!(main_utxo, None);
        assert_eq!(vault, Some([7; 20]));
    }

    #[tokio::test]
    async fn sweep_with_main_utxo_input_recovers_it() {
        let bitcoin_chain = LocalBitcoinChain::new();
        let host_chain = LocalHostChain::new();
        let wallet = dummy::wallet_public_key_hash(11);

        let main_utxo_funding_tx = dummy::transaction(&[], 1);
        let main_utxo_outpoint = bitcoin::OutPoint::new(main_utxo_funding_tx.compute_txid(), 0);
        bitcoin_chain.insert_confirmed_transaction(main_utxo_funding_tx.clone(), 10, 6, None);

        let main_utxo_value = main_utxo_funding_tx.output[0].value;
        let main_utxo_hash = crate::host::compute_main_utxo_hash(UnspentOutput {
            outpoint: main_utxo_outpoint,
            value: main_utxo_value,
        });
        host_chain.set_wallet(Wallet { public_key_hash: wallet, state: WalletState::Live, main_utxo_hash });

        let sweep_tx = dummy::transaction(&[main_utxo_outpoint], 1);

        let maintainer = maintainer(bitcoin_chain, host_chain);
        let (main_utxo, vault) =
            maintainer.parse_sweep_transaction_inputs(&sweep_tx, wallet).await.unwrap();

        assert_eq!(
            main_utxo,
            Some(UnspentOutput { outpoint: main_utxo_outpoint, value: main_utxo_value })
        );
        assert_eq!(vault, None);
    }
}

//! Difficulty-epoch prover (C6): advances the host chain's view of
//! Bitcoin difficulty one epoch at a time.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::bitcoin::chain::BitcoinChain;
use crate::bitcoin::header::{BlockHeader, BLOCKS_PER_EPOCH};
use crate::error::{Error, Result};
use crate::host::HostChain;

/// Drives a [`HostChain`]'s difficulty relay forward one epoch at a time
/// against a source of Bitcoin headers.
pub struct BitcoinDifficultyMaintainer<B, H> {
    bitcoin_chain: B,
    host_chain: H,
    epoch_proven_backoff_time: Duration,
    restart_backoff_time: Duration,
}

impl<B, H> BitcoinDifficultyMaintainer<B, H>
where
    B: BitcoinChain,
    H: HostChain,
{
    /// Builds a new maintainer. `restart_backoff_time` is the delay
    /// before re-entering the proving loop after an error;
    /// `epoch_proven_backoff_time` is the delay between two successful
    /// epoch proofs.
    pub fn new(
        bitcoin_chain: B,
        host_chain: H,
        restart_backoff_time: Duration,
        epoch_proven_backoff_time: Duration,
    ) -> Self {
        BitcoinDifficultyMaintainer {
            bitcoin_chain,
            host_chain,
            epoch_proven_backoff_time,
            restart_backoff_time,
        }
    }

    /// Runs the outer restart loop until `cancellation` fires: each pass
    /// proves as many consecutive epochs as the Bitcoin chain tip allows,
    /// and restarts after `restart_backoff_time` on error.
    pub async fn run(&self, cancellation: &CancellationToken) {
        tracing::info!("starting bitcoin difficulty maintainer");
        loop {
            if let Err(error) = self.prove_epochs(cancellation).await {
                tracing::error!(%error, "error while proving bitcoin difficulty epochs; restarting maintainer");
            }

            tokio::select! {
                _ = cancellation.cancelled() => break,
                _ = tokio::time::sleep(self.restart_backoff_time) => {}
            }
        }
        tracing::info!("stopping bitcoin difficulty maintainer");
    }

    /// Proves successive epochs until the Bitcoin chain tip can no longer
    /// supply a full retarget window, or `cancellation` fires.
    async fn prove_epochs(&self, cancellation: &CancellationToken) -> Result<()> {
        self.verify_submission_eligibility().await?;

        loop {
            match self.prove_next_epoch().await {
                Ok(()) => {}
                Err(Error::EpochNotYetMature { .. }) => return Ok(()),
                Err(error) => return Err(error),
            }

            tokio::select! {
                _ = cancellation.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.epoch_proven_backoff_time) => {}
            }
        }
    }

    /// Checks that this node may submit retargets: the relay must have
    /// performed its genesis step, and if authorization is required, the
    /// operator must be authorized.
    async fn verify_submission_eligibility(&self) -> Result<()> {
        if !self.host_chain.ready().await? {
            return Err(Error::DifficultyRelayNotReady);
        }

        if self.host_chain.authorization_required().await? && !self.host_chain.is_authorized().await? {
            return Err(Error::DifficultyRelayNotAuthorized);
        }

        Ok(())
    }

    /// Proves the epoch immediately after the relay's currently-proven
    /// epoch, provided the Bitcoin chain tip has reached far enough.
    async fn prove_next_epoch(&self) -> Result<()> {
        let current_epoch = self.host_chain.current_epoch().await?;
        let proof_length = self.host_chain.proof_length().await?;

        let first_new_epoch_height = (current_epoch + 1) * BLOCKS_PER_EPOCH as u64;

        let old_epoch_start = first_new_epoch_height - proof_length as u64;
        let new_epoch_start = first_new_epoch_height;

        let old_headers =
            self.get_block_headers(old_epoch_start as u32, (first_new_epoch_height - 1) as u32).await;
        let old_headers = match old_headers {
            Ok(headers) => headers,
            Err(Error::MissingBlockHeader(height)) => {
                return Err(Error::EpochNotYetMature { epoch: current_epoch + 1, needed: height })
            }
            Err(error) => return Err(error),
        };

        let new_headers = match self
            .get_block_headers(new_epoch_start as u32, (new_epoch_start + proof_length as u64 - 1) as u32)
            .await
        {
            Ok(headers) => headers,
            Err(Error::MissingBlockHeader(height)) => {
                return Err(Error::EpochNotYetMature { epoch: current_epoch + 1, needed: height })
            }
            Err(error) => return Err(error),
        };

        let mut headers = old_headers;
        headers.extend(new_headers);

        self.host_chain.retarget(headers).await?;

        tracing::info!(epoch = current_epoch + 1, "proved bitcoin difficulty epoch");

        Ok(())
    }

    /// Fetches headers `[start, end]` inclusive, in ascending height
    /// order.
    async fn get_block_headers(&self, start: u32, end: u32) -> Result<Vec<BlockHeader>> {
        let mut headers = Vec::with_capacity((end - start + 1) as usize);
        for height in start..=end {
            headers.push(self.bitcoin_chain.get_block_header(height).await?);
        }
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitcoin::local::LocalBitcoinChain;
    use crate::host::LocalHostChain;
    use crate::testing::dummy::block_header;

    fn maintainer(
        bitcoin_chain: LocalBitcoinChain,
        host_chain: LocalHostChain,
    ) -> BitcoinDifficultyMaintainer<LocalBitcoinChain, LocalHostChain> {
        BitcoinDifficultyMaintainer::new(
            bitcoin_chain,
            host_chain,
            Duration::from_secs(2),
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn submission_eligibility_requires_readiness_and_authorization() {
        let host_chain = LocalHostChain::new();
        let maintainer = maintainer(LocalBitcoinChain::new(), host_chain);

        assert!(matches!(
            maintainer.verify_submission_eligibility().await,
            Err(Error::DifficultyRelayNotReady)
        ));
    }

    #[tokio::test]
    async fn submission_eligibility_passes_once_ready_and_authorized() {
        let host_chain = LocalHostChain::new();
        host_chain.set_ready(true);
        host_chain.set_authorization_required(true);
        host_chain.set_authorized(true);
        let maintainer = maintainer(LocalBitcoinChain::new(), host_chain);

        assert!(maintainer.verify_submission_eligibility().await.is_ok());
    }

    #[tokio::test]
    async fn prove_next_epoch_emits_a_single_retarget_with_boundary_bits() {
        let bitcoin_chain = LocalBitcoinChain::new();
        // Old epoch 299 tail (604797..604799), new epoch 300 head (604800..604802).
        bitcoin_chain.set_block_header(604_797, block_header(1_111_111, 10));
        bitcoin_chain.set_block_header(604_798, block_header(1_111_111, 20));
        bitcoin_chain.set_block_header(604_799, block_header(1_111_111, 30));
        bitcoin_chain.set_block_header(604_800, block_header(2_222_222, 40));
        bitcoin_chain.set_block_header(604_801, block_header(2_222_222, 50));
        bitcoin_chain.set_block_header(604_802, block_header(2_222_222, 60));

        let host_chain = LocalHostChain::new();
        host_chain.set_current_epoch(299);
        host_chain.set_proof_length(3);

        let maintainer = maintainer(bitcoin_chain, host_chain);
        maintainer.prove_next_epoch().await.unwrap();

        let events = maintainer.host_chain.retarget_events();
        assert_eq!(events, vec![(1_111_111, 2_222_222)]);
    }

    #[tokio::test]
    async fn get_block_headers_returns_the_inclusive_range() {
        let bitcoin_chain = LocalBitcoinChain::new();
        bitcoin_chain.set_block_header(700_000, block_header(1_111_111, 30));
        bitcoin_chain.set_block_header(700_001, block_header(1_111_111, 40));
        bitcoin_chain.set_block_header(700_002, block_header(2_222_222, 50));

        let maintainer = maintainer(bitcoin_chain, LocalHostChain::new());
        let headers = maintainer.get_block_headers(700_000, 700_002).await.unwrap();

        assert_eq!(headers.len(), 3);
        assert_eq!(headers[0].bits, 1_111_111);
        assert_eq!(headers[2].bits, 2_222_222);
    }

    #[tokio::test]
    async fn prove_next_epoch_reports_epoch_not_yet_mature_when_headers_are_missing() {
        let host_chain = LocalHostChain::new();
        host_chain.set_proof_length(1);
        let maintainer = maintainer(LocalBitcoinChain::new(), host_chain);
        let result = maintainer.prove_next_epoch().await;
        assert!(matches!(result, Err(Error::EpochNotYetMature { .. })));
    }
}

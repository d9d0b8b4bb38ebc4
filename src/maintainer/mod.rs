//! The two long-lived maintainer control loops: sweep-proving (C5) and
//! Bitcoin difficulty-epoch proving (C6). Each owns a single cooperative
//! task and shares no mutable state with the other.

pub mod difficulty;
pub mod sweep;

pub use difficulty::BitcoinDifficultyMaintainer;
pub use sweep::{SweepMaintainer, SweepMaintainerConfig};

use tokio_util::sync::CancellationToken;

use crate::bitcoin::chain::BitcoinChain;
use crate::config::Settings;
use crate::host::HostChain;

/// Runs both maintainers to completion, each in its own task, sharing a
/// single cancellation signal. Returns once both have stopped, which
/// happens only after `cancellation` fires (or a maintainer task panics).
///
/// The caller supplies the Bitcoin and host chain adapters; wiring a
/// concrete host-chain client is the integrator's responsibility.
pub async fn run<B, H>(bitcoin_chain: B, host_chain: H, settings: Settings, cancellation: CancellationToken)
where
    B: BitcoinChain + Clone + Send + Sync + 'static,
    H: HostChain + Clone + Send + Sync + 'static,
{
    let sweep_maintainer = SweepMaintainer::new(
        bitcoin_chain.clone(),
        host_chain.clone(),
        SweepMaintainerConfig {
            history_depth: settings.history_depth,
            transaction_limit: settings.transaction_limit,
            restart_backoff_time: settings.restart_backoff_time,
            idle_backoff_time: settings.idle_backoff_time,
        },
    );

    let difficulty_maintainer = BitcoinDifficultyMaintainer::new(
        bitcoin_chain,
        host_chain,
        settings.restart_backoff_time,
        settings.epoch_proven_back_off_time,
    );

    let sweep_cancellation = cancellation.clone();
    let sweep_task = tokio::spawn(async move { sweep_maintainer.run(&sweep_cancellation).await });
    let difficulty_task =
        tokio::spawn(async move { difficulty_maintainer.run(&cancellation).await });

    let _ = tokio::join!(sweep_task, difficulty_task);
}

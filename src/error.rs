//! Top-level error type for the relay core.

use bitcoin::Txid;

use crate::keys::WalletPublicKeyHash;

/// The single error type returned by every fallible operation in this
/// crate.
///
/// Variants are grouped loosely by the error taxonomy from the design:
/// transient chain I/O, not-ready/not-authorized preconditions on the
/// difficulty relay, data-not-found, inconsistent on-chain state, and
/// precondition violations raised by the redemption assembler.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A call to the Bitcoin chain adapter failed at the transport layer.
    /// The `context` is a one-line description of what the caller was
    /// trying to do, matching the `fmt.Errorf("...: [%v]")` wrapping
    /// style used throughout the maintainer loops.
    #[error("{context}: {source}")]
    BitcoinChainIo {
        /// One-line description of the failed operation.
        context: &'static str,
        /// The underlying transport error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A call to the host chain adapter failed at the transport layer.
    #[error("{context}: {source}")]
    HostChainIo {
        /// One-line description of the failed operation.
        context: &'static str,
        /// The underlying transport error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The requested transaction does not exist on the Bitcoin chain.
    #[error("bitcoin transaction not found: {0}")]
    MissingTransaction(Txid),

    /// The requested transaction has not been confirmed, so it has no
    /// containing block to build an SPV proof from.
    #[error("bitcoin transaction {0} is not confirmed")]
    UnconfirmedTransaction(Txid),

    /// A block header at the given height could not be found while
    /// assembling an SPV proof or a difficulty retarget.
    #[error("missing block header at height {0}")]
    MissingBlockHeader(u32),

    /// [`crate::bitcoin::spv::assemble_proof`] was asked for a proof with
    /// zero required confirmations.
    #[error("required confirmations must be greater than zero")]
    ZeroConfirmationsRequested,

    /// The wallet referenced by an event or a deposit does not exist on
    /// the host chain.
    #[error("wallet {0} not found on host chain")]
    MissingWallet(WalletPublicKeyHash),

    /// The Bitcoin difficulty relay has not completed its genesis step.
    #[error("genesis has not been performed in the Bitcoin difficulty chain")]
    DifficultyRelayNotReady,

    /// The operator address is not authorized to submit difficulty
    /// retargets, and authorization is required.
    #[error("bitcoin difficulty maintainer has not been authorized to submit block headers")]
    DifficultyRelayNotAuthorized,

    /// The Bitcoin chain tip has not yet reached the height needed to
    /// prove the next difficulty epoch.
    #[error("insufficient bitcoin chain tip height to prove epoch {epoch}: need height {needed}")]
    EpochNotYetMature {
        /// The epoch the maintainer attempted to prove.
        epoch: u64,
        /// The block height required before the epoch can be proven.
        needed: u32,
    },

    /// The redemption assembler was given an empty request list.
    #[error("at least one redemption request is required")]
    EmptyRedemptionRequests,

    /// Deriving the wallet's change output script failed.
    #[error("cannot compute change output script: {0}")]
    ChangeScriptDerivation(#[source] bitcoin::key::UncompressedPublicKeyError),

    /// A configuration value failed validation at startup.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The host chain rejected a proof or retarget submission it had
    /// already accepted once before.
    #[error("host chain rejected duplicate submission: {0}")]
    DuplicateSubmission(String),
}

impl Error {
    /// Wraps an arbitrary Bitcoin-adapter transport error with a one-line
    /// context string, matching the loop-level error-wrapping policy
    /// described for C5/C6.
    pub fn bitcoin_io<E>(context: &'static str, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::BitcoinChainIo { context, source: Box::new(err) }
    }

    /// Wraps an arbitrary host-chain transport error with a one-line
    /// context string.
    pub fn host_io<E>(context: &'static str, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::HostChainIo { context, source: Box::new(err) }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

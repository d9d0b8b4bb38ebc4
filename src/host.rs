//! The host-chain adapter trait (C2): read/write access to the on-chain
//! wallet registry, deposit registry and difficulty relay that the
//! maintainers act on. The production binding to a concrete host chain
//! is out of scope here; this module defines the trait contract plus an
//! in-memory test double, [`LocalHostChain`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use bitcoin::{Amount, OutPoint, Transaction};
use sha3::{Digest, Keccak256};
use time::OffsetDateTime;

use crate::bitcoin::tx::UnspentOutput;
use crate::error::{Error, Result};
use crate::keys::WalletPublicKeyHash;

/// A wallet's lifecycle state on the host chain. Only [`WalletState::Live`]
/// and [`WalletState::MovingFunds`] wallets may submit deposit-sweep
/// proofs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalletState {
    /// The wallet has not yet been registered, or its state is not yet
    /// known to this node.
    Unknown,
    /// The wallet is active and accepting deposits and sweeps.
    Live,
    /// The wallet is winding down and moving its funds to another wallet.
    MovingFunds,
    /// The wallet is closing; no new activity is accepted.
    Closing,
    /// The wallet has fully closed.
    Closed,
    /// The wallet has been terminated (e.g. for misbehavior).
    Terminated,
}

impl WalletState {
    /// Whether a wallet in this state may submit deposit-sweep proofs.
    pub fn can_submit_sweep_proofs(self) -> bool {
        matches!(self, WalletState::Live | WalletState::MovingFunds)
    }
}

/// A wallet as recorded on the host chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wallet {
    /// The wallet's public key hash.
    pub public_key_hash: WalletPublicKeyHash,
    /// The wallet's current lifecycle state.
    pub state: WalletState,
    /// A commitment to the wallet's current consolidated output,
    /// `keccak256(outpoint ‖ value)`. All-zero until the wallet has swept
    /// at least once.
    pub main_utxo_hash: [u8; 32],
}

/// The Unix-epoch sentinel used in place of an `Option<OffsetDateTime>`
/// for "not yet swept", matching the host chain's own zero-timestamp
/// convention.
pub fn unswept_sentinel() -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH
}

/// A deposit revealed on the host chain, keyed by its funding outpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositRequest {
    /// The Bitcoin outpoint this deposit was revealed for.
    pub funding_outpoint: OutPoint,
    /// The deposit amount, in satoshis.
    pub amount: Amount,
    /// When the deposit was revealed.
    pub revealed_at: OffsetDateTime,
    /// When the deposit was swept, or [`unswept_sentinel`] if it has not
    /// been yet.
    pub swept_at: OffsetDateTime,
    /// The wallet the deposit was revealed against.
    pub wallet_public_key_hash: WalletPublicKeyHash,
    /// The vault to credit when this deposit is swept, if any.
    pub vault: Vault,
}

impl DepositRequest {
    /// Whether this deposit's sweep proof has already been accepted
    /// on-chain.
    pub fn is_swept(&self) -> bool {
        self.swept_at > self.revealed_at
    }
}

/// A `DepositRevealed` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositRevealedEvent {
    /// The wallet the deposit was revealed against.
    pub wallet_public_key_hash: WalletPublicKeyHash,
    /// The Bitcoin outpoint funding the deposit.
    pub funding_outpoint: OutPoint,
    /// The host-chain block the event was emitted in.
    pub block_number: u64,
}

/// A `DepositSweepProposalSubmitted` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositSweepProposalSubmittedEvent {
    /// The wallet the proposal targets.
    pub wallet_public_key_hash: WalletPublicKeyHash,
    /// The host-chain block the event was emitted in.
    pub block_number: u64,
}

/// Optional host-chain contract credited with the tBTC when a sweep
/// proof is accepted.
pub type Vault = Option<[u8; 20]>;

/// Read/write access to the host chain: wallet registry, deposit
/// registry, and the Bitcoin difficulty relay.
pub trait HostChain: Send + Sync {
    /// The current host-chain block height, used to compute the starting
    /// block of the sweep-proposal event scan.
    fn current_block(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Looks up a deposit by its funding outpoint. A not-found deposit is
    /// not an error.
    fn get_deposit_request(
        &self,
        outpoint: OutPoint,
    ) -> impl Future<Output = Result<Option<DepositRequest>>> + Send;

    /// Looks up a wallet by its public key hash.
    fn get_wallet(
        &self,
        wallet_public_key_hash: WalletPublicKeyHash,
    ) -> impl Future<Output = Result<Wallet>> + Send;

    /// Computes the on-chain main-UTXO commitment hash for a candidate
    /// UTXO, bit-for-bit identical to the host chain's own derivation:
    /// `keccak256(tx_hash ‖ be32(output_index) ‖ be64(value))`.
    fn compute_main_utxo_hash(&self, utxo: UnspentOutput) -> [u8; 32] {
        compute_main_utxo_hash(utxo)
    }

    /// Returns `DepositSweepProposalSubmitted` events from `from_block`
    /// onward.
    fn past_deposit_sweep_proposal_submitted_events(
        &self,
        from_block: u64,
    ) -> impl Future<Output = Result<Vec<DepositSweepProposalSubmittedEvent>>> + Send;

    /// Returns `DepositRevealed` events, optionally filtered to a single
    /// wallet.
    fn past_deposit_revealed_events(
        &self,
        wallet_public_key_hash: Option<WalletPublicKeyHash>,
    ) -> impl Future<Output = Result<Vec<DepositRevealedEvent>>> + Send;

    /// The number of Bitcoin confirmations an SPV proof must carry,
    /// derived from the host chain's own risk parameters.
    fn tx_proof_difficulty_factor(&self) -> impl Future<Output = Result<u32>> + Send;

    /// Returns the current and immediately previous Bitcoin difficulty
    /// epoch's difficulty, as recorded by the on-chain relay.
    fn get_current_and_prev_epoch_difficulty(
        &self,
    ) -> impl Future<Output = Result<(u128, u128)>> + Send;

    /// Submits a deposit-sweep SPV proof, crediting `vault` if present.
    /// `main_utxo` is the wallet's previous main UTXO consumed as an
    /// input, or `None` for a wallet's first sweep (which has no prior
    /// main UTXO to spend).
    fn submit_deposit_sweep_proof_with_reimbursement(
        &self,
        tx: Transaction,
        proof: crate::bitcoin::spv::SpvProof,
        main_utxo: Option<UnspentOutput>,
        vault: Vault,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Whether the difficulty relay has completed its genesis step.
    fn ready(&self) -> impl Future<Output = Result<bool>> + Send;

    /// Whether the difficulty relay requires the submitting operator to
    /// be explicitly authorized.
    fn authorization_required(&self) -> impl Future<Output = Result<bool>> + Send;

    /// Whether this node's operator address is authorized to submit
    /// retargets.
    fn is_authorized(&self) -> impl Future<Output = Result<bool>> + Send;

    /// The epoch number the relay has most recently proven.
    fn current_epoch(&self) -> impl Future<Output = Result<u64>> + Send;

    /// The number of headers the relay requires on each side of a
    /// retarget boundary.
    fn proof_length(&self) -> impl Future<Output = Result<u32>> + Send;

    /// Submits a retarget: `2 * proof_length` consecutive headers
    /// spanning a difficulty epoch boundary.
    fn retarget(
        &self,
        headers: Vec<crate::bitcoin::header::BlockHeader>,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// The host chain's main-UTXO commitment: `keccak256(tx_hash ‖
/// be32(output_index) ‖ be64(value))`, in the transaction hash's natural
/// byte order.
pub fn compute_main_utxo_hash(utxo: UnspentOutput) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(crate::bitcoin::hash::BitcoinHash::from(utxo.outpoint.txid).natural_bytes());
    hasher.update(utxo.outpoint.vout.to_be_bytes());
    hasher.update(utxo.value.to_sat().to_be_bytes());
    hasher.finalize().into()
}

#[derive(Debug, Default)]
struct RetargetEvent {
    old_bits: u32,
    new_bits: u32,
}

#[derive(Debug, Default)]
struct State {
    wallets: HashMap<WalletPublicKeyHash, Wallet>,
    deposits: HashMap<OutPoint, DepositRequest>,
    sweep_events: Vec<DepositSweepProposalSubmittedEvent>,
    revealed_events: Vec<DepositRevealedEvent>,
    submitted_proofs: Vec<(bitcoin::Txid, Vault)>,
    current_block: u64,
    tx_proof_difficulty_factor: u32,
    current_and_prev_epoch_difficulty: (u128, u128),
    ready: bool,
    authorization_required: bool,
    authorized: bool,
    current_epoch: u64,
    proof_length: u32,
    retarget_events: Vec<RetargetEvent>,
}

/// In-memory [`HostChain`] double, mirroring the Go original's
/// `ConnectLocal()` test fixture: a test populates wallets, deposits and
/// relay parameters directly, then asserts on the events and submissions
/// recorded back.
#[derive(Debug, Default)]
pub struct LocalHostChain {
    state: Mutex<State>,
}

impl LocalHostChain {
    /// Creates an empty chain double.
    pub fn new() -> Self {
        LocalHostChain::default()
    }

    /// Registers or replaces a wallet.
    pub fn set_wallet(&self, wallet: Wallet) {
        self.state.lock().unwrap().wallets.insert(wallet.public_key_hash, wallet);
    }

    /// Registers or replaces a deposit request.
    pub fn set_deposit_request(&self, deposit: DepositRequest) {
        self.state.lock().unwrap().deposits.insert(deposit.funding_outpoint, deposit);
    }

    /// Appends a `DepositSweepProposalSubmitted` event.
    pub fn push_sweep_event(&self, event: DepositSweepProposalSubmittedEvent) {
        self.state.lock().unwrap().sweep_events.push(event);
    }

    /// Appends a `DepositRevealed` event.
    pub fn push_revealed_event(&self, event: DepositRevealedEvent) {
        self.state.lock().unwrap().revealed_events.push(event);
    }

    /// Sets the current host-chain block height.
    pub fn set_current_block(&self, height: u64) {
        self.state.lock().unwrap().current_block = height;
    }

    /// Sets the confirmation count an SPV proof must carry.
    pub fn set_tx_proof_difficulty_factor(&self, factor: u32) {
        self.state.lock().unwrap().tx_proof_difficulty_factor = factor;
    }

    /// Sets the current and previous epoch difficulty pair.
    pub fn set_current_and_prev_epoch_difficulty(&self, current: u128, previous: u128) {
        self.state.lock().unwrap().current_and_prev_epoch_difficulty = (current, previous);
    }

    /// Sets whether the relay has performed genesis.
    pub fn set_ready(&self, ready: bool) {
        self.state.lock().unwrap().ready = ready;
    }

    /// Sets whether the relay requires operator authorization.
    pub fn set_authorization_required(&self, required: bool) {
        self.state.lock().unwrap().authorization_required = required;
    }

    /// Sets whether this operator is authorized.
    pub fn set_authorized(&self, authorized: bool) {
        self.state.lock().unwrap().authorized = authorized;
    }

    /// Sets the currently-proven epoch number.
    pub fn set_current_epoch(&self, epoch: u64) {
        self.state.lock().unwrap().current_epoch = epoch;
    }

    /// Sets the number of headers required on each side of a retarget.
    pub fn set_proof_length(&self, proof_length: u32) {
        self.state.lock().unwrap().proof_length = proof_length;
    }

    /// The deposit-sweep proofs submitted so far, in submission order.
    pub fn submitted_proofs(&self) -> Vec<(bitcoin::Txid, Vault)> {
        self.state.lock().unwrap().submitted_proofs.clone()
    }

    /// The number of successful retargets recorded, and the old/new bits
    /// of each, for assertions mirroring the Go test suite's
    /// `RetargetEvents()`.
    pub fn retarget_events(&self) -> Vec<(u32, u32)> {
        self.state.lock().unwrap().retarget_events.iter().map(|e| (e.old_bits, e.new_bits)).collect()
    }
}

impl HostChain for LocalHostChain {
    async fn current_block(&self) -> Result<u64> {
        Ok(self.state.lock().unwrap().current_block)
    }

    async fn get_deposit_request(&self, outpoint: OutPoint) -> Result<Option<DepositRequest>> {
        Ok(self.state.lock().unwrap().deposits.get(&outpoint).copied())
    }

    async fn get_wallet(&self, wallet_public_key_hash: WalletPublicKeyHash) -> Result<Wallet> {
        self.state
            .lock()
            .unwrap()
            .wallets
            .get(&wallet_public_key_hash)
            .copied()
            .ok_or(Error::MissingWallet(wallet_public_key_hash))
    }

    async fn past_deposit_sweep_proposal_submitted_events(
        &self,
        from_block: u64,
    ) -> Result<Vec<DepositSweepProposalSubmittedEvent>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .sweep_events
            .iter()
            .filter(|event| event.block_number >= from_block)
            .copied()
            .collect())
    }

    async fn past_deposit_revealed_events(
        &self,
        wallet_public_key_hash: Option<WalletPublicKeyHash>,
    ) -> Result<Vec<DepositRevealedEvent>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .revealed_events
            .iter()
            .filter(|event| {
                wallet_public_key_hash
                    .map(|wallet| wallet == event.wallet_public_key_hash)
                    .unwrap_or(true)
            })
            .copied()
            .collect())
    }

    async fn tx_proof_difficulty_factor(&self) -> Result<u32> {
        Ok(self.state.lock().unwrap().tx_proof_difficulty_factor)
    }

    async fn get_current_and_prev_epoch_difficulty(&self) -> Result<(u128, u128)> {
        Ok(self.state.lock().unwrap().current_and_prev_epoch_difficulty)
    }

    async fn submit_deposit_sweep_proof_with_reimbursement(
        &self,
        tx: Transaction,
        _proof: crate::bitcoin::spv::SpvProof,
        _main_utxo: Option<UnspentOutput>,
        vault: Vault,
    ) -> Result<()> {
        let txid = tx.compute_txid();
        let mut state = self.state.lock().unwrap();
        if state.submitted_proofs.iter().any(|(existing, _)| *existing == txid) {
            return Err(Error::DuplicateSubmission(txid.to_string()));
        }
        state.submitted_proofs.push((txid, vault));
        Ok(())
    }

    async fn ready(&self) -> Result<bool> {
        Ok(self.state.lock().unwrap().ready)
    }

    async fn authorization_required(&self) -> Result<bool> {
        Ok(self.state.lock().unwrap().authorization_required)
    }

    async fn is_authorized(&self) -> Result<bool> {
        Ok(self.state.lock().unwrap().authorized)
    }

    async fn current_epoch(&self) -> Result<u64> {
        Ok(self.state.lock().unwrap().current_epoch)
    }

    async fn proof_length(&self) -> Result<u32> {
        Ok(self.state.lock().unwrap().proof_length)
    }

    async fn retarget(&self, headers: Vec<crate::bitcoin::header::BlockHeader>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let old_bits = headers.first().map(|h| h.bits).unwrap_or_default();
        let new_bits = headers.last().map(|h| h.bits).unwrap_or_default();
        state.retarget_events.push(RetargetEvent { old_bits, new_bits });
        state.current_epoch += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash as _;
    use bitcoin::Txid;

    #[test]
    fn main_utxo_hash_is_deterministic() {
        let utxo = UnspentOutput {
            outpoint: OutPoint::new(Txid::from_byte_array([0xaa; 32]), 0),
            value: Amount::from_sat(500_000),
        };
        let first = compute_main_utxo_hash(utxo);
        let second = compute_main_utxo_hash(utxo);
        assert_eq!(first, second);

        let different_value =
            UnspentOutput { value: Amount::from_sat(500_001), ..utxo };
        assert_ne!(first, compute_main_utxo_hash(different_value));
    }

    #[tokio::test]
    async fn duplicate_submission_is_rejected() {
        let chain = LocalHostChain::new();
        let tx = crate::testing::dummy::transaction(&[], 1);
        let proof = crate::bitcoin::spv::SpvProof {
            merkle_proof: crate::bitcoin::chain::MerkleProof {
                transaction_count: 1,
                merkle_branch: Vec::new(),
                position: 0,
            },
            headers: Vec::new(),
        };
        let utxo = UnspentOutput {
            outpoint: OutPoint::new(Txid::from_byte_array([1; 32]), 0),
            value: Amount::from_sat(1),
        };

        chain
            .submit_deposit_sweep_proof_with_reimbursement(tx.clone(), proof.clone(), Some(utxo), None)
            .await
            .unwrap();

        let result =
            chain.submit_deposit_sweep_proof_with_reimbursement(tx, proof, Some(utxo), None).await;
        assert!(matches!(result, Err(Error::DuplicateSubmission(_))));
    }
}

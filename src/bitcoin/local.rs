//! An in-memory [`BitcoinChain`] fixture, mirroring the Go original's
//! `bitcoin.ConnectLocal()` test double: headers and transactions are
//! inserted directly by the test, with no real node behind it.

use std::collections::HashMap;
use std::sync::Mutex;

use bitcoin::{Transaction, Txid};

use crate::bitcoin::chain::{BitcoinChain, MerkleProof};
use crate::bitcoin::header::BlockHeader;
use crate::error::{Error, Result};
use crate::keys::WalletPublicKeyHash;

#[derive(Debug, Default)]
struct State {
    headers: HashMap<u32, BlockHeader>,
    confirmed: HashMap<Txid, (Transaction, u32, u32)>,
    mempool: HashMap<Txid, Transaction>,
    by_wallet: HashMap<WalletPublicKeyHash, Vec<Txid>>,
    tip_height: u32,
}

/// In-memory [`BitcoinChain`] double. Headers and transactions are set up
/// directly by the test via `set_block_header`, `insert_confirmed_transaction`
/// and `insert_mempool_transaction`.
#[derive(Debug, Default)]
pub struct LocalBitcoinChain {
    state: Mutex<State>,
}

impl LocalBitcoinChain {
    /// Creates an empty chain double with no headers or transactions.
    pub fn new() -> Self {
        LocalBitcoinChain::default()
    }

    /// Registers a header at the given height.
    pub fn set_block_header(&self, height: u32, header: BlockHeader) {
        let mut state = self.state.lock().unwrap();
        state.headers.insert(height, header);
        if height > state.tip_height {
            state.tip_height = height;
        }
    }

    /// Registers several headers in one call, keyed by height.
    pub fn set_block_headers(&self, headers: impl IntoIterator<Item = (u32, BlockHeader)>) {
        for (height, header) in headers {
            self.set_block_header(height, header);
        }
    }

    /// Registers a transaction as confirmed at `height` with `confirmations`
    /// accumulated, optionally indexed under a wallet public key hash.
    pub fn insert_confirmed_transaction(
        &self,
        tx: Transaction,
        height: u32,
        confirmations: u32,
        wallet_public_key_hash: Option<WalletPublicKeyHash>,
    ) {
        let txid = tx.compute_txid();
        let mut state = self.state.lock().unwrap();
        if let Some(wallet) = wallet_public_key_hash {
            state.by_wallet.entry(wallet).or_default().push(txid);
        }
        state.confirmed.insert(txid, (tx, height, confirmations));
    }

    /// Adds a transaction to the mempool, unconfirmed.
    pub fn insert_mempool_transaction(&self, tx: Transaction) {
        let txid = tx.compute_txid();
        self.state.lock().unwrap().mempool.insert(txid, tx);
    }
}

impl BitcoinChain for LocalBitcoinChain {
    async fn get_transaction(&self, txid: Txid) -> Result<Transaction> {
        let state = self.state.lock().unwrap();
        if let Some((tx, _, _)) = state.confirmed.get(&txid) {
            return Ok(tx.clone());
        }
        if let Some(tx) = state.mempool.get(&txid) {
            return Ok(tx.clone());
        }
        Err(Error::MissingTransaction(txid))
    }

    async fn get_transaction_confirmations(&self, txid: Txid) -> Result<u32> {
        let state = self.state.lock().unwrap();
        if let Some((_, _, confirmations)) = state.confirmed.get(&txid) {
            return Ok(*confirmations);
        }
        if state.mempool.contains_key(&txid) {
            return Ok(0);
        }
        Err(Error::MissingTransaction(txid))
    }

    async fn get_transactions_for_public_key_hash(
        &self,
        wallet_public_key_hash: WalletPublicKeyHash,
        limit: u32,
    ) -> Result<Vec<Transaction>> {
        let state = self.state.lock().unwrap();
        let txids = state.by_wallet.get(&wallet_public_key_hash).cloned().unwrap_or_default();
        Ok(txids
            .into_iter()
            .rev()
            .take(limit as usize)
            .filter_map(|txid| state.confirmed.get(&txid).map(|(tx, _, _)| tx.clone()))
            .collect())
    }

    async fn get_block_header(&self, height: u32) -> Result<BlockHeader> {
        self.state
            .lock()
            .unwrap()
            .headers
            .get(&height)
            .copied()
            .ok_or(Error::MissingBlockHeader(height))
    }

    async fn get_transaction_block_height(&self, txid: Txid) -> Result<u32> {
        let state = self.state.lock().unwrap();
        match state.confirmed.get(&txid) {
            Some((_, height, _)) => Ok(*height),
            None if state.mempool.contains_key(&txid) => Err(Error::UnconfirmedTransaction(txid)),
            None => Err(Error::MissingTransaction(txid)),
        }
    }

    async fn get_merkle_proof(&self, txid: Txid, _block_height: u32) -> Result<MerkleProof> {
        let state = self.state.lock().unwrap();
        if !state.confirmed.contains_key(&txid) {
            return Err(Error::MissingTransaction(txid));
        }
        Ok(MerkleProof { transaction_count: 1, merkle_branch: Vec::new(), position: 0 })
    }
}

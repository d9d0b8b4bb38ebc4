//! A [`BitcoinChain`] implementation backed by a real Bitcoin Core node,
//! reached over RPC via `bitcoincore-rpc`.
//!
//! `bitcoincore-rpc::Client` is synchronous; every call is dispatched
//! through [`tokio::task::spawn_blocking`] so it does not stall the async
//! runtime, the same pattern `bitcoind-async-client` uses to bridge a
//! blocking JSON-RPC client into an async trait.

use std::sync::Arc;

use bitcoin::{Transaction, Txid};
use bitcoincore_rpc::{Auth, Client, RpcApi};

use crate::bitcoin::chain::{BitcoinChain, MerkleProof};
use crate::bitcoin::hash::BitcoinHash;
use crate::bitcoin::header::BlockHeader;
use crate::error::{Error, Result};
use crate::keys::WalletPublicKeyHash;

const IO_CONTEXT_GET_TX: &str = "bitcoind getrawtransaction";
const IO_CONTEXT_GET_HEADER: &str = "bitcoind getblockheader";
const IO_CONTEXT_GET_HASH: &str = "bitcoind getblockhash";
const IO_CONTEXT_GET_PROOF: &str = "bitcoind getblock";
const IO_CONTEXT_LIST_UNSPENT: &str = "bitcoind listunspent";

/// A [`BitcoinChain`] backed by a Bitcoin Core node's RPC interface.
#[derive(Clone)]
pub struct RpcBitcoinChain {
    client: Arc<Client>,
}

impl RpcBitcoinChain {
    /// Connects to a Bitcoin Core node at `url`, authenticating with the
    /// given cookie file or username/password pair.
    pub fn connect(url: &str, auth: Auth) -> Result<Self> {
        let client = Client::new(url, auth)
            .map_err(|err| Error::bitcoin_io("connecting to bitcoind", err))?;
        Ok(RpcBitcoinChain { client: Arc::new(client) })
    }

    async fn spawn<T, F>(&self, context: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Client) -> bitcoincore_rpc::Result<T> + Send + 'static,
    {
        let client = Arc::clone(&self.client);
        tokio::task::spawn_blocking(move || f(&client))
            .await
            .map_err(|err| Error::bitcoin_io(context, err))?
            .map_err(|err| Error::bitcoin_io(context, err))
    }
}

impl BitcoinChain for RpcBitcoinChain {
    async fn get_transaction(&self, txid: Txid) -> Result<Transaction> {
        self.spawn(IO_CONTEXT_GET_TX, move |client| client.get_raw_transaction(&txid, None))
            .await
    }

    async fn get_transaction_confirmations(&self, txid: Txid) -> Result<u32> {
        let info = self
            .spawn(IO_CONTEXT_GET_TX, move |client| {
                client.get_raw_transaction_info(&txid, None)
            })
            .await?;
        Ok(info.confirmations.unwrap_or(0))
    }

    async fn get_transactions_for_public_key_hash(
        &self,
        wallet_public_key_hash: WalletPublicKeyHash,
        limit: u32,
    ) -> Result<Vec<Transaction>> {
        let script = crate::keys::script_for_public_key_hash(wallet_public_key_hash);

        let txids: Vec<Txid> = self
            .spawn(IO_CONTEXT_LIST_UNSPENT, move |client| {
                let unspent = client.list_unspent(Some(1), None, None, None, None)?;
                Ok(unspent
                    .into_iter()
                    .filter(|utxo| utxo.script_pub_key == script)
                    .map(|utxo| utxo.txid)
                    .collect())
            })
            .await?;

        let mut transactions = Vec::new();
        for txid in txids.into_iter().take(limit as usize) {
            transactions.push(self.get_transaction(txid).await?);
        }
        Ok(transactions)
    }

    async fn get_block_header(&self, height: u32) -> Result<BlockHeader> {
        let hash = self
            .spawn(IO_CONTEXT_GET_HASH, move |client| client.get_block_hash(height as u64))
            .await?;
        let header = self
            .spawn(IO_CONTEXT_GET_HEADER, move |client| client.get_block_header(&hash))
            .await?;

        Ok(BlockHeader {
            version: header.version.to_consensus(),
            prev_block_hash: BitcoinHash::from(header.prev_blockhash),
            merkle_root_hash: BitcoinHash::from(header.merkle_root),
            time: header.time,
            bits: header.bits.to_consensus(),
            nonce: header.nonce,
        })
    }

    async fn get_transaction_block_height(&self, txid: Txid) -> Result<u32> {
        let info = self
            .spawn(IO_CONTEXT_GET_TX, move |client| {
                client.get_raw_transaction_info(&txid, None)
            })
            .await?;
        let block_hash = info.blockhash.ok_or(Error::UnconfirmedTransaction(txid))?;
        let header_info = self
            .spawn(IO_CONTEXT_GET_HEADER, move |client| {
                client.get_block_header_info(&block_hash)
            })
            .await?;
        Ok(header_info.height as u32)
    }

    async fn get_merkle_proof(&self, txid: Txid, block_height: u32) -> Result<MerkleProof> {
        let block_hash = self
            .spawn(IO_CONTEXT_GET_HASH, move |client| client.get_block_hash(block_height as u64))
            .await?;
        let block = self
            .spawn(IO_CONTEXT_GET_PROOF, move |client| client.get_block(&block_hash))
            .await?;

        let leaves: Vec<BitcoinHash> =
            block.txdata.iter().map(|tx| BitcoinHash::from(tx.compute_txid())).collect();
        let position = leaves
            .iter()
            .position(|leaf| BitcoinHash::from(txid) == *leaf)
            .ok_or(Error::MissingTransaction(txid))?;

        let (merkle_branch, _root) = crate::bitcoin::merkle::branch(&leaves, position);

        Ok(MerkleProof {
            transaction_count: leaves.len() as u32,
            merkle_branch,
            position: position as u32,
        })
    }
}

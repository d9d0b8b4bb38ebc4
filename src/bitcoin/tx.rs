//! A minimal unsigned-transaction builder, used by the redemption
//! assembler to accumulate inputs and outputs before handing the result
//! off for signing.

use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};

/// An unspent output a wallet holds, identified by its outpoint and
/// value. The redemption assembler spends the wallet's main UTXO as the
/// sole input of a redemption transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnspentOutput {
    /// The outpoint of the unspent output.
    pub outpoint: OutPoint,
    /// The value held at that outpoint.
    pub value: Amount,
}

/// Accumulates inputs and outputs for an unsigned transaction. Inputs
/// added through [`TransactionBuilder::add_public_key_hash_input`] carry
/// no `scriptSig` or witness; those are filled in once the transaction
/// is signed.
#[derive(Debug, Default)]
pub struct TransactionBuilder {
    inputs: Vec<TxIn>,
    outputs: Vec<TxOut>,
    total_inputs_value: Amount,
}

impl TransactionBuilder {
    /// Starts an empty builder.
    pub fn new() -> Self {
        TransactionBuilder::default()
    }

    /// Adds an input spending a P2WPKH unspent output.
    pub fn add_public_key_hash_input(&mut self, utxo: UnspentOutput) {
        self.inputs.push(TxIn {
            previous_output: utxo.outpoint,
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
            witness: Witness::new(),
        });
        self.total_inputs_value += utxo.value;
    }

    /// Appends an output to the transaction.
    pub fn add_output(&mut self, output: TxOut) {
        self.outputs.push(output);
    }

    /// The summed value of every input added so far.
    pub fn total_inputs_value(&self) -> Amount {
        self.total_inputs_value
    }

    /// Finalizes the unsigned transaction.
    pub fn build(self) -> Transaction {
        Transaction {
            version: bitcoin::transaction::Version::TWO,
            lock_time: bitcoin::absolute::LockTime::ZERO,
            input: self.inputs,
            output: self.outputs,
        }
    }
}

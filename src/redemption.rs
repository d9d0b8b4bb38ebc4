//! Redemption transaction assembly (C7): turns a batch of pending
//! redemption requests plus a wallet's main UTXO into an unsigned Bitcoin
//! transaction.

use bitcoin::{Amount, ScriptBuf, TxOut};
use time::OffsetDateTime;

use crate::bitcoin::tx::{TransactionBuilder, UnspentOutput};
use crate::error::{Error, Result};
use crate::keys::pay_to_witness_public_key_hash;

/// Where the change output, if any, is placed in the redemption
/// transaction's output vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedemptionTransactionShape {
    /// The change output is the first one in the output vector. This is
    /// the default: a fixed change position lets a receiving chain prove
    /// redemption transactions more cheaply.
    #[default]
    ChangeFirst,
    /// The change output is the last one in the output vector.
    ChangeLast,
}

/// A single pending redemption request.
#[derive(Debug, Clone)]
pub struct RedemptionRequest {
    /// The output script the redeemed funds are locked to. Not prefixed
    /// with its own byte length.
    pub redeemer_output_script: ScriptBuf,
    /// The amount requested for redemption, before fees.
    pub requested_amount: Amount,
    /// The treasury fee charged at the moment the request was created.
    pub treasury_fee: Amount,
    /// The maximum per-redemption Bitcoin transaction fee this request
    /// tolerates, fixed at request creation time.
    pub tx_max_fee: Amount,
    /// When the request was created.
    pub requested_at: OffsetDateTime,
}

/// Assembles an unsigned redemption transaction spending `wallet_main_utxo`
/// and paying out `requests`, with a total transaction fee of `fee`
/// satoshis split evenly across the requests (the remainder going to the
/// last request).
///
/// Fails if `requests` is empty; `wallet_main_utxo` is always required by
/// the caller, since a wallet with no main UTXO cannot redeem anything.
pub fn assemble_redemption_transaction(
    wallet_public_key: &bitcoin::PublicKey,
    wallet_main_utxo: UnspentOutput,
    requests: &[RedemptionRequest],
    fee: Amount,
    shape: Option<RedemptionTransactionShape>,
) -> Result<bitcoin::Transaction> {
    if requests.is_empty() {
        return Err(Error::EmptyRedemptionRequests);
    }
    let shape = shape.unwrap_or_default();

    let mut builder = TransactionBuilder::new();
    builder.add_public_key_hash_input(wallet_main_utxo);

    let redemptions_count = requests.len() as i64;
    let fee_sats = fee.to_sat() as i64;
    let fee_per_redemption_remainder = fee_sats % redemptions_count;
    let fee_per_redemption = (fee_sats - fee_per_redemption_remainder) / redemptions_count;

    let mut total_redemption_outputs_value: i64 = 0;
    let mut outputs = Vec::with_capacity(requests.len());

    for (i, request) in requests.iter().enumerate() {
        let redeemable_amount =
            request.requested_amount.to_sat() as i64 - request.treasury_fee.to_sat() as i64;
        let mut redemption_output_value = redeemable_amount - fee_per_redemption;
        if i == requests.len() - 1 {
            redemption_output_value -= fee_per_redemption_remainder;
        }

        total_redemption_outputs_value += redemption_output_value;

        outputs.push(TxOut {
            value: Amount::from_sat(redemption_output_value.max(0) as u64),
            script_pubkey: request.redeemer_output_script.clone(),
        });
    }

    let change_output_value =
        builder.total_inputs_value().to_sat() as i64 - total_redemption_outputs_value - fee_sats;

    if change_output_value > 0 {
        let change_script = pay_to_witness_public_key_hash(wallet_public_key)
            .map_err(Error::ChangeScriptDerivation)?;
        let change_output =
            TxOut { value: Amount::from_sat(change_output_value as u64), script_pubkey: change_script };

        match shape {
            RedemptionTransactionShape::ChangeFirst => outputs.insert(0, change_output),
            RedemptionTransactionShape::ChangeLast => outputs.push(change_output),
        }
    }

    for output in outputs {
        builder.add_output(output);
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash as _;
    use bitcoin::secp256k1::{PublicKey as SecpPublicKey, Secp256k1, SecretKey};
    use bitcoin::{OutPoint, Txid};

    fn test_public_key() -> bitcoin::PublicKey {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[0x11; 32]).unwrap();
        bitcoin::PublicKey::new(SecpPublicKey::from_secret_key(&secp, &secret))
    }

    fn main_utxo(value_sat: u64) -> UnspentOutput {
        UnspentOutput {
            outpoint: OutPoint::new(Txid::from_byte_array([9; 32]), 0),
            value: Amount::from_sat(value_sat),
        }
    }

    fn request(requested: u64, treasury_fee: u64) -> RedemptionRequest {
        RedemptionRequest {
            redeemer_output_script: ScriptBuf::new(),
            requested_amount: Amount::from_sat(requested),
            treasury_fee: Amount::from_sat(treasury_fee),
            tx_max_fee: Amount::from_sat(10_000),
            requested_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn empty_requests_is_rejected() {
        let result = assemble_redemption_transaction(
            &test_public_key(),
            main_utxo(100_000),
            &[],
            Amount::from_sat(1_000),
            Some(RedemptionTransactionShape::ChangeFirst),
        );
        assert!(matches!(result, Err(Error::EmptyRedemptionRequests)));
    }

    #[test]
    fn fee_remainder_goes_to_the_last_request() {
        let requests = vec![request(100_000, 0), request(100_000, 0), request(100_000, 0)];
        let tx = assemble_redemption_transaction(
            &test_public_key(),
            main_utxo(300_000),
            &requests,
            Amount::from_sat(100),
            Some(RedemptionTransactionShape::ChangeLast),
        )
        .unwrap();

        // fee 100 / 3 = 33 remainder 1; last output absorbs the extra 1 sat.
        assert_eq!(tx.output[0].value, Amount::from_sat(99_967));
        assert_eq!(tx.output[1].value, Amount::from_sat(99_967));
        assert_eq!(tx.output[2].value, Amount::from_sat(99_966));
    }

    #[test]
    fn change_first_places_change_output_at_index_zero() {
        let requests = vec![request(50_000, 0)];
        let tx = assemble_redemption_transaction(
            &test_public_key(),
            main_utxo(100_000),
            &requests,
            Amount::from_sat(1_000),
            Some(RedemptionTransactionShape::ChangeFirst),
        )
        .unwrap();

        assert_eq!(tx.output.len(), 2);
        assert_eq!(tx.output[0].value, Amount::from_sat(50_000));
        assert_eq!(tx.output[1].value, Amount::from_sat(49_000));
    }

    #[test]
    fn no_change_output_when_inputs_are_fully_spent() {
        let requests = vec![request(99_000, 0)];
        let tx = assemble_redemption_transaction(
            &test_public_key(),
            main_utxo(99_000),
            &requests,
            Amount::from_sat(1_000),
            None,
        )
        .unwrap();

        assert_eq!(tx.output.len(), 1);
    }
}

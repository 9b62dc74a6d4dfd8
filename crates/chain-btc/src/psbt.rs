//! PSBT (BIP-174) codec for handing a consolidation to an offline signer.
//!
//! The online side encodes the unsigned transaction with a witness-output
//! record per input, serializes it to base64 and optionally splits it into
//! fixed-size chunks for a bandwidth-limited transport. The signer returns a
//! finalized PSBT, from which the raw transaction is extracted for broadcast.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bitcoin::psbt::Psbt;
use bitcoin::{Amount, TxOut};

use crate::error::BtcError;
use crate::transaction::ConsolidationPlan;

/// Wrap the plan's unsigned transaction in a PSBT and attach, for every input,
/// the value and script of the output it spends.
pub fn encode(plan: &ConsolidationPlan) -> Result<Psbt, BtcError> {
    let mut psbt = Psbt::from_unsigned_tx(plan.unsigned_tx().clone())
        .map_err(|e| BtcError::Codec(format!("cannot wrap unsigned transaction: {e}")))?;

    for (input, utxo) in psbt.inputs.iter_mut().zip(plan.utxos()) {
        input.witness_utxo = Some(TxOut {
            value: Amount::from_sat(utxo.amount_sat),
            script_pubkey: utxo.script_pubkey.clone(),
        });
    }

    Ok(psbt)
}

pub fn serialize(psbt: &Psbt) -> Vec<u8> {
    psbt.serialize()
}

pub fn serialize_base64(psbt: &Psbt) -> String {
    STANDARD.encode(psbt.serialize())
}

pub fn deserialize(bytes: &[u8]) -> Result<Psbt, BtcError> {
    Psbt::deserialize(bytes).map_err(|e| BtcError::Codec(format!("invalid PSBT: {e}")))
}

/// Decode base64 PSBT text. Whitespace anywhere in the text is ignored so that
/// line-wrapped or reassembled input decodes as-is.
pub fn decode(text: &str) -> Result<Psbt, BtcError> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(BtcError::Codec("empty PSBT text".into()));
    }
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| BtcError::Codec(format!("invalid base64: {e}")))?;
    deserialize(&bytes)
}

/// Split text into consecutive chunks of at most `chunk_size` characters.
pub fn chunk(text: &str, chunk_size: usize) -> Result<Vec<String>, BtcError> {
    if chunk_size == 0 {
        return Err(BtcError::Validation("chunk size must be at least 1".into()));
    }
    let chars: Vec<char> = text.chars().collect();
    Ok(chars
        .chunks(chunk_size)
        .map(|c| c.iter().collect())
        .collect())
}

/// Inverse of [`chunk`]: concatenate chunks in order.
pub fn reassemble<I, S>(chunks: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    chunks.into_iter().fold(String::new(), |mut acc, c| {
        acc.push_str(c.as_ref());
        acc
    })
}

/// Whether every input carries a final scriptSig or witness.
pub fn is_finalized(psbt: &Psbt) -> bool {
    first_unfinalized(psbt).is_none()
}

fn first_unfinalized(psbt: &Psbt) -> Option<usize> {
    psbt.inputs
        .iter()
        .position(|input| input.final_script_witness.is_none() && input.final_script_sig.is_none())
}

/// Extract the signed raw transaction (consensus bytes) from a finalized PSBT.
pub fn extract_final_transaction(psbt: Psbt) -> Result<Vec<u8>, BtcError> {
    if let Some(input) = first_unfinalized(&psbt) {
        return Err(BtcError::NotFinalized { input });
    }
    let tx = psbt
        .extract_tx()
        .map_err(|e| BtcError::Codec(format!("cannot extract transaction: {e}")))?;
    Ok(bitcoin::consensus::serialize(&tx))
}

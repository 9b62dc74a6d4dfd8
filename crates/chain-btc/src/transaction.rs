use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::script::ScriptBuf;
use bitcoin::transaction::Version;
use bitcoin::{Amount, Sequence, Transaction, TxIn, TxOut, Witness};

use crate::address::is_recipient_script;
use crate::error::BtcError;
use crate::utxo::{Utxo, UtxoSet};

/// Segwit marker and flag bytes, counted once per transaction (weight units).
const SEGWIT_MARKER_WU: u64 = 2;

/// Expected P2WPKH witness per input (weight units): item count, a
/// length-prefixed DER signature with sighash byte (72) and a
/// length-prefixed compressed public key (33).
const P2WPKH_WITNESS_WU: u64 = 1 + 1 + 72 + 1 + 33;

const WITNESS_SCALE_FACTOR: u64 = 4;

/// Fee rate in satoshis per virtual byte.
///
/// Held as the exact decimal `units / 10^scale`, so a fractional rate such as
/// 1.0006 multiplies exactly and `floor(size * rate)` carries no rounding of
/// the rate itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeRate {
    units: u128,
    /// Fractional digits, with trailing zeros stripped.
    scale: u32,
}

impl FeeRate {
    /// Build a fee rate from a (possibly fractional) sat/vB value.
    ///
    /// The value is taken at its shortest decimal form, which is the text a
    /// fee endpoint or the command line supplied.
    pub fn from_sat_per_vb(rate: f64) -> Result<Self, BtcError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(BtcError::Validation(format!(
                "fee rate must be a positive number, got {rate}"
            )));
        }
        rate.to_string().parse()
    }

    pub fn as_sat_per_vb(self) -> f64 {
        self.decimal().parse().unwrap_or(f64::MAX)
    }

    /// `floor(size * rate)`. `None` if the result does not fit in a u64.
    pub fn fee_for_size(self, size_bytes: u64) -> Option<u64> {
        let product = u128::from(size_bytes).checked_mul(self.units)?;
        // Past 10^38 the divisor exceeds any u128 product.
        let fee = match 10u128.checked_pow(self.scale) {
            Some(divisor) => product / divisor,
            None => 0,
        };
        u64::try_from(fee).ok()
    }

    fn decimal(self) -> String {
        let digits = self.units.to_string();
        let scale = self.scale as usize;
        if scale == 0 {
            return digits;
        }
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (int, frac) = padded.split_at(padded.len() - scale);
        format!("{int}.{frac}")
    }
}

impl FromStr for FeeRate {
    type Err = BtcError;

    /// Parse a plain decimal such as `12`, `2.5` or `0.0004`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let invalid = || BtcError::Validation(format!("invalid fee rate '{text}'"));

        let (int, frac) = text.split_once('.').unwrap_or((text, ""));
        let frac = frac.trim_end_matches('0');
        if int.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !int.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let units = format!("{int}{frac}")
            .parse::<u128>()
            .map_err(|_| BtcError::Validation(format!("fee rate '{text}' is too large")))?;
        if units == 0 {
            return Err(BtcError::Validation(format!(
                "fee rate must be a positive number, got {text}"
            )));
        }
        let scale = u32::try_from(frac.len()).map_err(|_| invalid())?;
        Ok(Self { units, scale })
    }
}

impl std::fmt::Display for FeeRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} sat/vB", self.decimal())
    }
}

/// How the transaction size used for the fee is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SizeMode {
    /// Serialized size without any witness data. Underestimates the true
    /// virtual size of a signed P2WPKH spend by roughly 27 vbytes per input.
    #[default]
    Unsigned,
    /// Virtual size including an expected P2WPKH witness on every input.
    WitnessEstimate,
}

impl SizeMode {
    /// Size in (virtual) bytes that the fee rate is applied to.
    pub fn measure(self, tx: &Transaction) -> u64 {
        let base = tx.base_size() as u64;
        match self {
            SizeMode::Unsigned => base,
            SizeMode::WitnessEstimate => {
                let weight = base * WITNESS_SCALE_FACTOR
                    + SEGWIT_MARKER_WU
                    + tx.input.len() as u64 * P2WPKH_WITNESS_WU;
                weight.div_ceil(WITNESS_SCALE_FACTOR)
            }
        }
    }
}

impl std::fmt::Display for SizeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizeMode::Unsigned => write!(f, "unsigned"),
            SizeMode::WitnessEstimate => write!(f, "witness"),
        }
    }
}

impl FromStr for SizeMode {
    type Err = BtcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unsigned" => Ok(SizeMode::Unsigned),
            "witness" | "witness-estimate" => Ok(SizeMode::WitnessEstimate),
            other => Err(BtcError::Validation(format!("unknown size mode '{other}'"))),
        }
    }
}

/// A fully balanced consolidation: every UTXO spent into a single output.
///
/// `output_sat() + fee_sat() == total_input_sat()` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidationPlan {
    utxos: Vec<Utxo>,
    recipient_script: ScriptBuf,
    fee_rate: FeeRate,
    size_bytes: u64,
    fee_sat: u64,
    total_input_sat: u64,
    unsigned_tx: Transaction,
}

impl ConsolidationPlan {
    /// Spent UTXOs, in the same order as the transaction inputs.
    pub fn utxos(&self) -> &[Utxo] {
        &self.utxos
    }

    pub fn recipient_script(&self) -> &ScriptBuf {
        &self.recipient_script
    }

    pub fn fee_rate(&self) -> FeeRate {
        self.fee_rate
    }

    /// Size the fee was charged on, as measured by the chosen [`SizeMode`].
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn fee_sat(&self) -> u64 {
        self.fee_sat
    }

    pub fn total_input_sat(&self) -> u64 {
        self.total_input_sat
    }

    pub fn output_sat(&self) -> u64 {
        self.total_input_sat - self.fee_sat
    }

    pub fn unsigned_tx(&self) -> &Transaction {
        &self.unsigned_tx
    }
}

/// Build the transaction spending every UTXO in `utxos` to `recipient`.
///
/// Inputs follow the set's canonical outpoint order. The fee is
/// `floor(size * fee_rate)` where the size is measured per `mode`; the single
/// output receives the remainder. No dust threshold is applied to the output.
pub fn build_consolidation(
    utxos: &UtxoSet,
    recipient: ScriptBuf,
    fee_rate: FeeRate,
    mode: SizeMode,
) -> Result<ConsolidationPlan, BtcError> {
    if !is_recipient_script(&recipient) {
        return Err(BtcError::Validation(
            "recipient script is not a P2PKH, P2SH or witness program output".into(),
        ));
    }
    if utxos.is_empty() {
        return Err(BtcError::NoUtxos);
    }

    let total_input_sat = utxos
        .total_sat()
        .ok_or_else(|| BtcError::Validation("sum of input values overflows".into()))?;

    let spent: Vec<Utxo> = utxos.iter().cloned().collect();
    let inputs = spent
        .iter()
        .map(|utxo| TxIn {
            previous_output: utxo.outpoint(),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
            witness: Witness::default(),
        })
        .collect();

    // The output value is fixed-width, so the size does not depend on it.
    let mut tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: inputs,
        output: vec![TxOut {
            value: Amount::ZERO,
            script_pubkey: recipient.clone(),
        }],
    };

    let size_bytes = mode.measure(&tx);
    let fee_sat = fee_rate
        .fee_for_size(size_bytes)
        .ok_or(BtcError::InsufficientFunds {
            available: total_input_sat,
            required: u64::MAX,
        })?;

    if fee_sat > total_input_sat {
        return Err(BtcError::InsufficientFunds {
            available: total_input_sat,
            required: fee_sat,
        });
    }
    let output_sat = total_input_sat - fee_sat;
    tx.output[0].value = Amount::from_sat(output_sat);

    tracing::debug!(
        inputs = spent.len(),
        size_bytes,
        %mode,
        %fee_rate,
        fee_sat,
        output_sat,
        "built consolidation transaction"
    );

    Ok(ConsolidationPlan {
        utxos: spent,
        recipient_script: recipient,
        fee_rate,
        size_bytes,
        fee_sat,
        total_input_sat,
        unsigned_tx: tx,
    })
}

//! Consolidation workflow: derive, collect, price, build, encode; and the
//! return leg: decode, extract, broadcast.
//!
//! Every run walks the stages below in order and stops at the first failure.
//! Nothing leaves the process before [`broadcast_signed`], so dropping a
//! build future at any point has no external effect.

use std::sync::Arc;

use bitcoin::psbt::Psbt;
use chain_btc::address::recipient_script;
use chain_btc::transaction::build_consolidation;
use chain_btc::{psbt, BtcError, ConsolidationPlan, ExtendedPublicKey};
use chain_provider::{
    lookup_fee_rate, Broadcaster, ChainStateProvider, FeeRateSource, UtxoCollector,
};

use crate::config::Settings;
use crate::error::PiggybankError;
use crate::status::SavingsStatus;

/// Workflow states, in order. A run ends in `BroadcastOk` or `BroadcastFailed`,
/// or at the first error. Signing and transport happen outside this process
/// between `PsbtEncoded` and `PsbtDecoded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    KeysReady,
    AddressesDerived,
    UtxosCollected,
    FeeRateKnown,
    PlanBuilt,
    PsbtEncoded,
    PsbtDecoded,
    Finalized,
    BroadcastOk,
    BroadcastFailed,
}

impl Stage {
    /// Terminal stage reached by a relay submission.
    pub fn after_broadcast<T, E>(outcome: &Result<T, E>) -> Self {
        match outcome {
            Ok(_) => Stage::BroadcastOk,
            Err(_) => Stage::BroadcastFailed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::BroadcastOk | Stage::BroadcastFailed)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::KeysReady => "keys_ready",
            Stage::AddressesDerived => "addresses_derived",
            Stage::UtxosCollected => "utxos_collected",
            Stage::FeeRateKnown => "fee_rate_known",
            Stage::PlanBuilt => "plan_built",
            Stage::PsbtEncoded => "psbt_encoded",
            Stage::PsbtDecoded => "psbt_decoded",
            Stage::Finalized => "finalized",
            Stage::BroadcastOk => "broadcast_ok",
            Stage::BroadcastFailed => "broadcast_failed",
        };
        f.write_str(name)
    }
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct ConsolidationOutput {
    pub plan: ConsolidationPlan,
    pub psbt: Psbt,
    pub psbt_base64: String,
}

impl ConsolidationOutput {
    /// Program output: base64 PSBT, total input sats, fee.
    pub fn lines(&self) -> [String; 3] {
        [
            self.psbt_base64.clone(),
            self.plan.total_input_sat().to_string(),
            self.plan.fee_sat().to_string(),
        ]
    }
}

pub struct Consolidator<P> {
    key: Arc<ExtendedPublicKey>,
    provider: P,
    fees: Box<dyn FeeRateSource>,
    settings: Settings,
}

impl<P: ChainStateProvider> Consolidator<P> {
    pub fn new(
        key: Arc<ExtendedPublicKey>,
        provider: P,
        fees: impl FeeRateSource + 'static,
        settings: Settings,
    ) -> Self {
        tracing::debug!(stage = %Stage::KeysReady, network = %key.network(), "consolidator ready");
        Self {
            key,
            provider,
            fees: Box::new(fees),
            settings,
        }
    }

    pub fn key(&self) -> &ExtendedPublicKey {
        &self.key
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Build the consolidation PSBT paying everything to `recipient`.
    ///
    /// The recipient is validated before any network call.
    pub async fn build(&self, recipient: &str) -> Result<ConsolidationOutput, PiggybankError> {
        let recipient = recipient_script(recipient, self.settings.network)?;

        let addresses = self.key.derive_range(self.settings.address_count)?;
        tracing::info!(stage = %Stage::AddressesDerived, count = addresses.len());

        let utxos = self.collector().collect(&addresses).await?;
        tracing::info!(stage = %Stage::UtxosCollected, utxos = utxos.len());
        if utxos.is_empty() {
            return Err(BtcError::NoUtxos.into());
        }

        let fee_rate = lookup_fee_rate(self.fees.as_ref(), self.settings.request_timeout).await?;
        tracing::info!(stage = %Stage::FeeRateKnown, %fee_rate);

        let plan = build_consolidation(&utxos, recipient, fee_rate, self.settings.size_mode)?;
        tracing::info!(
            stage = %Stage::PlanBuilt,
            total_sat = plan.total_input_sat(),
            fee_sat = plan.fee_sat(),
            output_sat = plan.output_sat(),
        );

        let psbt = psbt::encode(&plan)?;
        let psbt_base64 = psbt::serialize_base64(&psbt);
        tracing::info!(stage = %Stage::PsbtEncoded, chars = psbt_base64.len());

        Ok(ConsolidationOutput {
            plan,
            psbt,
            psbt_base64,
        })
    }

    /// Balance, output count and next unused address over the status window.
    pub async fn savings_status(&self) -> Result<SavingsStatus, PiggybankError> {
        let addresses = self.key.derive_range(self.settings.status_address_count)?;
        let infos = self.collector().address_info(&addresses).await?;
        let status =
            SavingsStatus::from_address_info(&addresses, &infos, self.settings.full_threshold);
        tracing::info!(
            balance_sat = status.balance_sat,
            utxo_count = status.utxo_count,
            full = status.is_full(),
            "savings status"
        );
        Ok(status)
    }

    fn collector(&self) -> UtxoCollector<'_, P> {
        UtxoCollector::new(&self.provider)
            .with_concurrency(self.settings.concurrency)
            .with_timeout(self.settings.request_timeout)
    }
}

/// Decode a signed PSBT, extract the final transaction and submit it.
/// Returns the txid reported by the relay.
pub async fn broadcast_signed<B>(broadcaster: &B, signed_base64: &str) -> Result<String, PiggybankError>
where
    B: Broadcaster + ?Sized,
{
    let decoded = psbt::decode(signed_base64)?;
    tracing::info!(stage = %Stage::PsbtDecoded, inputs = decoded.inputs.len());

    let raw = psbt::extract_final_transaction(decoded)?;
    tracing::info!(stage = %Stage::Finalized, bytes = raw.len());

    let outcome = broadcaster.submit(&hex::encode(&raw)).await;
    let stage = Stage::after_broadcast(&outcome);
    match &outcome {
        Ok(txid) => tracing::info!(%stage, %txid, "broadcast accepted"),
        Err(e) => tracing::warn!(%stage, error = %e, "broadcast failed"),
    }
    outcome.map_err(PiggybankError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names() {
        assert_eq!(Stage::KeysReady.to_string(), "keys_ready");
        assert_eq!(Stage::PsbtEncoded.to_string(), "psbt_encoded");
        assert_eq!(Stage::BroadcastOk.to_string(), "broadcast_ok");
        assert_eq!(Stage::BroadcastFailed.to_string(), "broadcast_failed");
    }

    #[test]
    fn broadcast_outcome_picks_terminal_stage() {
        let accepted: Result<&str, &str> = Ok("txid");
        let rejected: Result<&str, &str> = Err("bad-txns");

        assert_eq!(Stage::after_broadcast(&accepted), Stage::BroadcastOk);
        assert_eq!(Stage::after_broadcast(&rejected), Stage::BroadcastFailed);
        assert!(Stage::BroadcastOk.is_terminal());
        assert!(Stage::BroadcastFailed.is_terminal());
        assert!(!Stage::Finalized.is_terminal());
    }
}

use std::str::FromStr;

use bitcoin::script::ScriptBuf;
use bitcoin::Txid;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// An unspent output as listed for an address, before its script is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentOutput {
    pub txid: Txid,
    pub vout: u32,
    pub value_sat: u64,
}

/// One output of a previous transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub script_pubkey: ScriptBuf,
    pub value_sat: u64,
}

/// Address statistics (Esplora `GET /address/{address}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
    #[serde(default)]
    pub address: String,
    pub chain_stats: ChainStats,
    pub mempool_stats: ChainStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStats {
    pub funded_txo_count: u64,
    pub funded_txo_sum: u64,
    pub spent_txo_count: u64,
    pub spent_txo_sum: u64,
    pub tx_count: u64,
}

impl AddressInfo {
    pub fn confirmed_balance(&self) -> u64 {
        self.chain_stats
            .funded_txo_sum
            .saturating_sub(self.chain_stats.spent_txo_sum)
    }

    /// Confirmed plus pending balance, floored at zero.
    pub fn total_balance(&self) -> u64 {
        let funded = self
            .chain_stats
            .funded_txo_sum
            .saturating_add(self.mempool_stats.funded_txo_sum);
        let spent = self
            .chain_stats
            .spent_txo_sum
            .saturating_add(self.mempool_stats.spent_txo_sum);
        funded.saturating_sub(spent)
    }

    /// Outputs received and not yet spent, confirmed or pending.
    pub fn unspent_count(&self) -> u64 {
        let funded = self
            .chain_stats
            .funded_txo_count
            .saturating_add(self.mempool_stats.funded_txo_count);
        let spent = self
            .chain_stats
            .spent_txo_count
            .saturating_add(self.mempool_stats.spent_txo_count);
        funded.saturating_sub(spent)
    }

    /// No transaction has ever touched this address.
    pub fn is_unused(&self) -> bool {
        self.chain_stats.tx_count == 0 && self.mempool_stats.tx_count == 0
    }
}

/// mempool.space `GET /v1/fees/recommended`, in sat/vB.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedFees {
    pub fastest_fee: f64,
    pub half_hour_fee: f64,
    pub hour_fee: f64,
    pub economy_fee: f64,
    pub minimum_fee: f64,
}

impl RecommendedFees {
    pub fn for_priority(&self, priority: FeePriority) -> f64 {
        match priority {
            FeePriority::Fastest => self.fastest_fee,
            FeePriority::HalfHour => self.half_hour_fee,
            FeePriority::Hour => self.hour_fee,
            FeePriority::Economy => self.economy_fee,
            FeePriority::Minimum => self.minimum_fee,
        }
    }
}

/// Which recommended fee tier to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeePriority {
    #[default]
    Fastest,
    HalfHour,
    Hour,
    Economy,
    Minimum,
}

impl std::fmt::Display for FeePriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FeePriority::Fastest => "fastest",
            FeePriority::HalfHour => "half-hour",
            FeePriority::Hour => "hour",
            FeePriority::Economy => "economy",
            FeePriority::Minimum => "minimum",
        };
        f.write_str(name)
    }
}

impl FromStr for FeePriority {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fastest" => Ok(FeePriority::Fastest),
            "half-hour" | "halfhour" => Ok(FeePriority::HalfHour),
            "hour" => Ok(FeePriority::Hour),
            "economy" => Ok(FeePriority::Economy),
            "minimum" => Ok(FeePriority::Minimum),
            other => Err(ProviderError::Malformed(format!(
                "unknown fee priority '{other}'"
            ))),
        }
    }
}

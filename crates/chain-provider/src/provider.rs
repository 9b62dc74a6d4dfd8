use async_trait::async_trait;
use bitcoin::Txid;
use chain_btc::FeeRate;

use crate::error::{BroadcastError, ProviderError};
use crate::types::{AddressInfo, TxOutput, UnspentOutput};

/// Read access to chain state.
#[async_trait]
pub trait ChainStateProvider: Send + Sync {
    /// Unspent outputs paying `address`. An address the provider knows
    /// nothing about yields an empty list, not an error.
    async fn list_unspent(&self, address: &str) -> Result<Vec<UnspentOutput>, ProviderError>;

    /// All outputs of a transaction, in output-index order.
    async fn transaction_outputs(&self, txid: &Txid) -> Result<Vec<TxOutput>, ProviderError>;

    async fn address_info(&self, address: &str) -> Result<AddressInfo, ProviderError>;
}

/// Source of the fee rate for a build.
#[async_trait]
pub trait FeeRateSource: Send + Sync {
    async fn fee_rate(&self) -> Result<FeeRate, ProviderError>;
}

/// Relay for finalized transactions.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Submit a raw transaction as hex. Returns the txid reported by the relay.
    async fn submit(&self, tx_hex: &str) -> Result<String, BroadcastError>;
}

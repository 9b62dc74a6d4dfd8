//! Network side of the piggybank consolidator.
//!
//! Defines the chain-state, fee-rate and broadcast seams, an Esplora/mempool.space
//! HTTP implementation of them, and the UTXO collector that queries many derived
//! addresses with bounded concurrency and a fail-closed retry policy.

pub mod collector;
pub mod error;
pub mod esplora;
pub mod fees;
pub mod provider;
pub mod retry;
pub mod types;

pub use collector::UtxoCollector;
pub use error::{BroadcastError, ProviderError};
pub use esplora::EsploraClient;
pub use fees::{lookup_fee_rate, FixedFeeRate, MempoolFeeSource};
pub use provider::{Broadcaster, ChainStateProvider, FeeRateSource};
pub use types::{AddressInfo, ChainStats, FeePriority, RecommendedFees, TxOutput, UnspentOutput};

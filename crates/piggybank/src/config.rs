use std::path::{Path, PathBuf};
use std::time::Duration;

use chain_btc::{BtcNetwork, ExtendedPublicKey, FeeRate, SizeMode};
use chain_provider::FeePriority;
use serde::{Deserialize, Serialize};

use crate::error::PiggybankError;

pub const DEFAULT_KEY_FILE: &str = "zpub.json";
pub const DEFAULT_ADDRESS_COUNT: u32 = 12;
pub const DEFAULT_STATUS_ADDRESS_COUNT: u32 = 21;
pub const DEFAULT_FULL_THRESHOLD: u64 = 21;
pub const DEFAULT_CHUNK_SIZE: usize = 200;

/// Persisted key record, e.g. `{"zpub": "zpub6r..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    #[serde(alias = "xpub", alias = "vpub", alias = "tpub")]
    pub zpub: String,
}

impl KeyRecord {
    pub fn new(key: impl Into<String>) -> Self {
        Self { zpub: key.into() }
    }

    pub fn load(path: &Path) -> Result<Self, PiggybankError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PiggybankError::Config(format!("cannot read key record {}: {e}", path.display()))
        })?;
        let record: KeyRecord = serde_json::from_str(&text).map_err(|e| {
            PiggybankError::Config(format!("malformed key record {}: {e}", path.display()))
        })?;
        if record.zpub.trim().is_empty() {
            return Err(PiggybankError::Config(format!(
                "key record {} holds an empty key",
                path.display()
            )));
        }
        Ok(record)
    }

    pub fn save(&self, path: &Path) -> Result<(), PiggybankError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PiggybankError::Config(format!("cannot encode key record: {e}")))?;
        std::fs::write(path, json + "\n").map_err(|e| {
            PiggybankError::Config(format!("cannot write key record {}: {e}", path.display()))
        })
    }

    /// Parse the stored key for `network`.
    pub fn extended_key(&self, network: BtcNetwork) -> Result<ExtendedPublicKey, PiggybankError> {
        Ok(ExtendedPublicKey::parse(&self.zpub, network)?)
    }
}

/// Runtime settings. Built once per process and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Settings {
    pub network: BtcNetwork,
    pub key_file: PathBuf,
    pub esplora_url: String,
    pub fee_url: String,
    pub fee_priority: FeePriority,
    /// Operator-supplied rate; when set the fee endpoint is not consulted.
    pub fee_rate: Option<FeeRate>,
    pub address_count: u32,
    pub status_address_count: u32,
    pub full_threshold: u64,
    pub concurrency: usize,
    pub request_timeout: Duration,
    pub chunk_size: usize,
    pub size_mode: SizeMode,
}

impl Settings {
    /// Defaults for `network`, including its public Esplora and fee endpoints.
    pub fn for_network(network: BtcNetwork) -> Self {
        Self {
            network,
            key_file: PathBuf::from(DEFAULT_KEY_FILE),
            esplora_url: network.default_esplora_url().to_string(),
            fee_url: network.default_fee_url().to_string(),
            fee_priority: FeePriority::default(),
            fee_rate: None,
            address_count: DEFAULT_ADDRESS_COUNT,
            status_address_count: DEFAULT_STATUS_ADDRESS_COUNT,
            full_threshold: DEFAULT_FULL_THRESHOLD,
            concurrency: chain_provider::collector::DEFAULT_CONCURRENCY,
            request_timeout: chain_provider::collector::DEFAULT_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            size_mode: SizeMode::default(),
        }
    }

    pub fn validate(&self) -> Result<(), PiggybankError> {
        if self.address_count == 0 || self.status_address_count == 0 {
            return Err(PiggybankError::Config(
                "address count must be at least 1".into(),
            ));
        }
        if self.concurrency == 0 {
            return Err(PiggybankError::Config("concurrency must be at least 1".into()));
        }
        if self.chunk_size == 0 {
            return Err(PiggybankError::Config("chunk size must be at least 1".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(PiggybankError::Config("request timeout must be positive".into()));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::for_network(BtcNetwork::default())
    }
}

use std::str::FromStr;

use bitcoin::Network;

use crate::error::BtcError;

/// Default Esplora endpoint for Bitcoin mainnet.
pub const MAINNET_ESPLORA: &str = "https://blockstream.info/api";

/// Default Esplora endpoint for Bitcoin testnet.
pub const TESTNET_ESPLORA: &str = "https://blockstream.info/testnet/api";

/// Default Esplora endpoint for Bitcoin signet.
pub const SIGNET_ESPLORA: &str = "https://mempool.space/signet/api";

/// Default recommended-fee endpoints (mempool.space).
pub const MAINNET_FEES: &str = "https://mempool.space/api/v1/fees/recommended";
pub const TESTNET_FEES: &str = "https://mempool.space/testnet/api/v1/fees/recommended";
pub const SIGNET_FEES: &str = "https://mempool.space/signet/api/v1/fees/recommended";

/// Supported Bitcoin networks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BtcNetwork {
    #[default]
    Mainnet,
    Testnet,
    Signet,
}

impl BtcNetwork {
    /// Convert to the `bitcoin` crate's `Network` type.
    pub fn to_bitcoin_network(self) -> Network {
        match self {
            BtcNetwork::Mainnet => Network::Bitcoin,
            BtcNetwork::Testnet => Network::Testnet,
            BtcNetwork::Signet => Network::Signet,
        }
    }

    /// Whether this is the real-money network. Testnet and signet share key
    /// prefixes and address HRPs, so they are treated as one class.
    pub fn is_mainnet(self) -> bool {
        matches!(self, BtcNetwork::Mainnet)
    }

    /// Return the default Esplora endpoint for this network.
    pub fn default_esplora_url(self) -> &'static str {
        match self {
            BtcNetwork::Mainnet => MAINNET_ESPLORA,
            BtcNetwork::Testnet => TESTNET_ESPLORA,
            BtcNetwork::Signet => SIGNET_ESPLORA,
        }
    }

    /// Return the default recommended-fee endpoint for this network.
    pub fn default_fee_url(self) -> &'static str {
        match self {
            BtcNetwork::Mainnet => MAINNET_FEES,
            BtcNetwork::Testnet => TESTNET_FEES,
            BtcNetwork::Signet => SIGNET_FEES,
        }
    }
}

impl std::fmt::Display for BtcNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BtcNetwork::Mainnet => write!(f, "mainnet"),
            BtcNetwork::Testnet => write!(f, "testnet"),
            BtcNetwork::Signet => write!(f, "signet"),
        }
    }
}

impl FromStr for BtcNetwork {
    type Err = BtcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Ok(BtcNetwork::Mainnet),
            "testnet" | "test" => Ok(BtcNetwork::Testnet),
            "signet" => Ok(BtcNetwork::Signet),
            other => Err(BtcError::InvalidNetwork(format!("unknown network '{other}'"))),
        }
    }
}

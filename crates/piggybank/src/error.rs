use chain_btc::BtcError;
use chain_provider::{BroadcastError, ProviderError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PiggybankError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("chain provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("broadcast failed: {0}")]
    Broadcast(#[from] BroadcastError),
}

impl From<BtcError> for PiggybankError {
    fn from(e: BtcError) -> Self {
        match e {
            BtcError::InvalidKey(_) | BtcError::InvalidNetwork(_) => {
                PiggybankError::Config(e.to_string())
            }
            BtcError::InvalidAddress(_) | BtcError::Validation(_) => {
                PiggybankError::Validation(e.to_string())
            }
            BtcError::NoUtxos | BtcError::InsufficientFunds { .. } => {
                PiggybankError::InsufficientFunds(e.to_string())
            }
            BtcError::Codec(_) | BtcError::NotFinalized { .. } => {
                PiggybankError::Codec(e.to_string())
            }
        }
    }
}

impl From<std::io::Error> for PiggybankError {
    fn from(e: std::io::Error) -> Self {
        PiggybankError::Config(e.to_string())
    }
}

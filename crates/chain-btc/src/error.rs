use thiserror::Error;

/// Bitcoin chain operation errors.
#[derive(Debug, Error)]
pub enum BtcError {
    #[error("invalid extended public key: {0}")]
    InvalidKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("no UTXOs available to consolidate")]
    NoUtxos,

    #[error("insufficient funds: have {available} sat, fee requires {required} sat")]
    InsufficientFunds { available: u64, required: u64 },

    #[error("PSBT codec error: {0}")]
    Codec(String),

    #[error("PSBT is not finalized: input {input} carries no final script")]
    NotFinalized { input: usize },

    #[error("invalid network: {0}")]
    InvalidNetwork(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_key() {
        let err = BtcError::InvalidKey("bad checksum".into());
        assert_eq!(err.to_string(), "invalid extended public key: bad checksum");
    }

    #[test]
    fn display_invalid_address() {
        let err = BtcError::InvalidAddress("bad checksum".into());
        assert_eq!(err.to_string(), "invalid address: bad checksum");
    }

    #[test]
    fn display_insufficient_funds() {
        let err = BtcError::InsufficientFunds {
            available: 1_000,
            required: 1_230,
        };
        assert_eq!(
            err.to_string(),
            "insufficient funds: have 1000 sat, fee requires 1230 sat"
        );
    }

    #[test]
    fn display_not_finalized() {
        let err = BtcError::NotFinalized { input: 2 };
        assert_eq!(
            err.to_string(),
            "PSBT is not finalized: input 2 carries no final script"
        );
    }

    #[test]
    fn display_invalid_network() {
        let err = BtcError::InvalidNetwork("regtest not supported".into());
        assert_eq!(err.to_string(), "invalid network: regtest not supported");
    }

    #[test]
    fn error_trait_is_implemented() {
        let err: Box<dyn std::error::Error> = Box::new(BtcError::Codec("test".into()));
        assert!(err.to_string().contains("test"));
    }
}

//! Bitcoin chain support for the piggybank consolidator.
//!
//! Provides watch-only P2WPKH address derivation from an extended public key,
//! UTXO bookkeeping, consolidation transaction building with exact fee
//! accounting, and the PSBT codec used to hand the transaction to an offline
//! signer. Nothing in this crate touches private keys or the network.

pub mod address;
pub mod error;
pub mod hd_derivation;
pub mod network;
pub mod psbt;
pub mod transaction;
pub mod utxo;

pub use error::BtcError;
pub use hd_derivation::{DerivedAddress, ExtendedPublicKey};
pub use network::BtcNetwork;
pub use transaction::{ConsolidationPlan, FeeRate, SizeMode};
pub use utxo::{Utxo, UtxoSet};

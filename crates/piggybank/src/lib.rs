//! Watch-only Bitcoin piggybank.
//!
//! Derives receiving addresses from an account zpub, watches them through an
//! Esplora provider and sweeps everything they hold into one PSBT for an offline
//! signer. Signed PSBTs come back through [`pipeline::broadcast_signed`].

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod status;

pub use config::{KeyRecord, Settings};
pub use error::PiggybankError;
pub use pipeline::{broadcast_signed, ConsolidationOutput, Consolidator, Stage};
pub use status::SavingsStatus;

//! Command-line surface.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chain_btc::{psbt, BtcNetwork, ExtendedPublicKey, FeeRate, SizeMode};
use chain_provider::{EsploraClient, FeePriority, FixedFeeRate, MempoolFeeSource};
use clap::{Args, Parser, Subcommand};

use crate::config::{
    KeyRecord, Settings, DEFAULT_ADDRESS_COUNT, DEFAULT_CHUNK_SIZE, DEFAULT_FULL_THRESHOLD,
    DEFAULT_KEY_FILE, DEFAULT_STATUS_ADDRESS_COUNT,
};
use crate::error::PiggybankError;
use crate::pipeline::{broadcast_signed, Consolidator};

/// Watch-only piggybank: consolidate every UTXO of a zpub into one PSBT.
#[derive(Parser, Debug)]
#[command(name = "piggybank")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Recipient address; shorthand for `consolidate <RECIPIENT>`.
    pub recipient: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Bitcoin network (mainnet, testnet, signet).
    #[arg(long, env = "PIGGYBANK_NETWORK", default_value = "mainnet", global = true)]
    pub network: BtcNetwork,

    /// Key record holding the account extended public key.
    #[arg(long, env = "PIGGYBANK_KEY_FILE", default_value = DEFAULT_KEY_FILE, global = true)]
    pub key_file: PathBuf,

    /// Esplora API root. Defaults to a public endpoint for the network.
    #[arg(long, env = "PIGGYBANK_ESPLORA_URL", global = true)]
    pub esplora_url: Option<String>,

    /// Recommended-fee endpoint (mempool.space format).
    #[arg(long, env = "PIGGYBANK_FEE_URL", global = true)]
    pub fee_url: Option<String>,

    /// Recommended-fee tier (fastest, half-hour, hour, economy, minimum).
    #[arg(long, env = "PIGGYBANK_FEE_PRIORITY", default_value = "fastest", global = true)]
    pub fee_priority: FeePriority,

    /// Fixed fee rate in sat/vB; skips the fee endpoint.
    #[arg(long, env = "PIGGYBANK_FEE_RATE", global = true)]
    pub fee_rate: Option<f64>,

    /// Receiving addresses scanned for consolidation.
    #[arg(long, env = "PIGGYBANK_ADDRESS_COUNT", default_value_t = DEFAULT_ADDRESS_COUNT, global = true)]
    pub address_count: u32,

    /// Concurrent provider requests.
    #[arg(long, default_value_t = chain_provider::collector::DEFAULT_CONCURRENCY, global = true)]
    pub concurrency: usize,

    /// Per-request timeout in seconds.
    #[arg(long, env = "PIGGYBANK_TIMEOUT_SECS", default_value_t = 15, global = true)]
    pub timeout_secs: u64,

    /// Size used for the fee: `unsigned` (no witness) or `witness` (estimated).
    #[arg(long, env = "PIGGYBANK_SIZE_MODE", default_value = "unsigned", global = true)]
    pub size_mode: SizeMode,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the consolidation PSBT and print it with the input total and fee.
    Consolidate {
        /// Address that receives the consolidated funds.
        recipient: String,
    },

    /// Show balance, unspent output count and the next unused address.
    Status {
        /// Addresses to scan.
        #[arg(long, default_value_t = DEFAULT_STATUS_ADDRESS_COUNT)]
        count: u32,

        /// Unspent outputs at which the piggybank counts as full.
        #[arg(long, default_value_t = DEFAULT_FULL_THRESHOLD)]
        full_threshold: u64,
    },

    /// List receiving addresses.
    Addresses {
        #[arg(long, default_value_t = DEFAULT_ADDRESS_COUNT)]
        count: u32,
    },

    /// Split a base64 PSBT into transport chunks, one per line.
    Chunks {
        /// Characters per chunk.
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        size: usize,

        psbt: String,
    },

    /// Extract and broadcast the transaction from a finalized base64 PSBT.
    Broadcast { psbt: String },

    /// Validate an extended public key and store it in the key record.
    SetKey { key: String },
}

impl GlobalArgs {
    pub fn settings(&self) -> Result<Settings, PiggybankError> {
        let mut settings = Settings::for_network(self.network);
        settings.key_file = self.key_file.clone();
        if let Some(url) = &self.esplora_url {
            settings.esplora_url = url.clone();
        }
        if let Some(url) = &self.fee_url {
            settings.fee_url = url.clone();
        }
        settings.fee_priority = self.fee_priority;
        settings.fee_rate = self.fee_rate.map(FeeRate::from_sat_per_vb).transpose()?;
        settings.address_count = self.address_count;
        settings.concurrency = self.concurrency;
        settings.request_timeout = Duration::from_secs(self.timeout_secs);
        settings.size_mode = self.size_mode;
        settings.validate()?;
        Ok(settings)
    }
}

impl Cli {
    /// Resolve the positional shorthand into a command.
    pub fn into_command(self) -> Result<(GlobalArgs, Command), PiggybankError> {
        match (self.recipient, self.command) {
            (Some(recipient), None) => Ok((self.global, Command::Consolidate { recipient })),
            (None, Some(command)) => Ok((self.global, command)),
            (Some(_), Some(_)) => Err(PiggybankError::Validation(
                "give either a recipient or a subcommand, not both".into(),
            )),
            (None, None) => Err(PiggybankError::Validation(
                "missing recipient address or subcommand".into(),
            )),
        }
    }
}

/// Execute the parsed command. Returns the lines to print on stdout.
pub async fn run(cli: Cli) -> Result<Vec<String>, PiggybankError> {
    let (global, command) = cli.into_command()?;
    let mut settings = global.settings()?;

    match command {
        Command::Consolidate { recipient } => {
            let consolidator = consolidator(settings)?;
            let output = consolidator.build(&recipient).await?;
            Ok(output.lines().to_vec())
        }
        Command::Status {
            count,
            full_threshold,
        } => {
            settings.status_address_count = count;
            settings.full_threshold = full_threshold;
            settings.validate()?;
            let status = consolidator(settings)?.savings_status().await?;
            Ok(status.lines())
        }
        Command::Addresses { count } => {
            let key = load_key(&settings)?;
            Ok(key
                .derive_range(count)?
                .into_iter()
                .map(|a| format!("{} {}", a.index, a.address))
                .collect())
        }
        Command::Chunks { size, psbt: text } => {
            let text = text.trim();
            psbt::decode(text)?;
            Ok(psbt::chunk(text, size)?)
        }
        Command::Broadcast { psbt: text } => {
            let relay = EsploraClient::new(&settings.esplora_url, settings.request_timeout)?;
            let txid = broadcast_signed(&relay, &text).await?;
            Ok(vec![txid])
        }
        Command::SetKey { key } => {
            let parsed = ExtendedPublicKey::parse(&key, settings.network)?;
            KeyRecord::new(key.trim()).save(&settings.key_file)?;
            tracing::info!(prefix = parsed.prefix(), path = %settings.key_file.display(), "key record saved");
            Ok(vec![format!(
                "saved {} key to {}",
                parsed.prefix(),
                settings.key_file.display()
            )])
        }
    }
}

fn load_key(settings: &Settings) -> Result<ExtendedPublicKey, PiggybankError> {
    KeyRecord::load(&settings.key_file)?.extended_key(settings.network)
}

fn consolidator(settings: Settings) -> Result<Consolidator<EsploraClient>, PiggybankError> {
    let key = Arc::new(load_key(&settings)?);
    let esplora = EsploraClient::new(&settings.esplora_url, settings.request_timeout)?;

    Ok(match settings.fee_rate {
        Some(rate) => Consolidator::new(key, esplora, FixedFeeRate(rate), settings),
        None => {
            let fees = MempoolFeeSource::new(
                &settings.fee_url,
                settings.fee_priority,
                settings.request_timeout,
            )?;
            Consolidator::new(key, esplora, fees, settings)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BIP84_ZPUB: &str = "zpub6rFR7y4Q2AijBEqTUquhVz398htDFrtymD9xYYfG1m4wAcvPhXNfE3EfH1r1ADqtfSdVCToUG868RvUUkgDKf31mGDtKsAYz2oz2AGutZYs";

    #[test]
    fn bare_recipient_means_consolidate() {
        let cli = Cli::try_parse_from(["piggybank", "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"])
            .unwrap();
        let (_, command) = cli.into_command().unwrap();
        assert!(matches!(
            command,
            Command::Consolidate { recipient } if recipient == "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
        ));
    }

    #[test]
    fn subcommand_with_global_options() {
        let cli = Cli::try_parse_from([
            "piggybank",
            "status",
            "--network",
            "signet",
            "--count",
            "5",
        ])
        .unwrap();
        assert_eq!(cli.global.network, BtcNetwork::Signet);
        let (_, command) = cli.into_command().unwrap();
        assert!(matches!(command, Command::Status { count: 5, full_threshold: 21 }));
    }

    #[test]
    fn nothing_to_do_is_an_error() {
        let cli = Cli::try_parse_from(["piggybank"]).unwrap();
        assert!(matches!(cli.into_command(), Err(PiggybankError::Validation(_))));
    }

    #[test]
    fn unknown_network_is_rejected_by_parser() {
        assert!(Cli::try_parse_from(["piggybank", "--network", "regtest", "addresses"]).is_err());
    }

    #[test]
    fn settings_from_flags() {
        let cli = Cli::try_parse_from([
            "piggybank",
            "--network",
            "testnet",
            "--fee-rate",
            "2.5",
            "--size-mode",
            "witness",
            "--esplora-url",
            "http://127.0.0.1:3002",
            "addresses",
        ])
        .unwrap();
        let settings = cli.global.settings().unwrap();
        assert_eq!(settings.network, BtcNetwork::Testnet);
        assert_eq!(settings.fee_rate.unwrap().as_sat_per_vb(), 2.5);
        assert_eq!(settings.size_mode, SizeMode::WitnessEstimate);
        assert_eq!(settings.esplora_url, "http://127.0.0.1:3002");
        assert!(settings.fee_url.contains("testnet"));
    }

    #[test]
    fn non_positive_fee_rate_is_rejected() {
        let cli = Cli::try_parse_from(["piggybank", "--fee-rate", "0", "addresses"]).unwrap();
        assert!(matches!(cli.global.settings(), Err(PiggybankError::Validation(_))));
    }

    #[tokio::test]
    async fn set_key_then_list_addresses() {
        let dir = tempfile::tempdir().unwrap();
        let key_file = dir.path().join("zpub.json");
        let key_arg = key_file.to_str().unwrap();

        let saved = run(Cli::try_parse_from(["piggybank", "--key-file", key_arg, "set-key", BIP84_ZPUB]).unwrap())
            .await
            .unwrap();
        assert!(saved[0].starts_with("saved zpub key"));

        let lines = run(
            Cli::try_parse_from(["piggybank", "--key-file", key_arg, "addresses", "--count", "2"]).unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(
            lines,
            vec![
                "0 bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu",
                "1 bc1qnjg0jd8228aq7egyzacy8cys3knf9xvrerkf9g"
            ]
        );
    }

    #[tokio::test]
    async fn set_key_rejects_wrong_network_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let key_file = dir.path().join("zpub.json");
        let cli = Cli::try_parse_from([
            "piggybank",
            "--network",
            "testnet",
            "--key-file",
            key_file.to_str().unwrap(),
            "set-key",
            BIP84_ZPUB,
        ])
        .unwrap();

        assert!(matches!(run(cli).await, Err(PiggybankError::Config(_))));
        assert!(!key_file.exists());
    }

    #[tokio::test]
    async fn missing_key_record_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let key_file = dir.path().join("absent.json");
        let cli = Cli::try_parse_from([
            "piggybank",
            "--key-file",
            key_file.to_str().unwrap(),
            "addresses",
        ])
        .unwrap();
        assert!(matches!(run(cli).await, Err(PiggybankError::Config(_))));
    }

    #[tokio::test]
    async fn chunks_rejects_non_psbt_text() {
        let cli = Cli::try_parse_from(["piggybank", "chunks", "aGVsbG8="]).unwrap();
        assert!(matches!(run(cli).await, Err(PiggybankError::Codec(_))));
    }
}

//! Esplora REST client (Blockstream / mempool.space compatible).

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::script::ScriptBuf;
use bitcoin::Txid;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{BroadcastError, ProviderError};
use crate::provider::{Broadcaster, ChainStateProvider};
use crate::types::{AddressInfo, TxOutput, UnspentOutput};

#[derive(Debug, Deserialize)]
struct EsploraUtxo {
    txid: String,
    vout: u32,
    value: u64,
}

#[derive(Debug, Deserialize)]
struct EsploraTx {
    vout: Vec<EsploraVout>,
}

#[derive(Debug, Deserialize)]
struct EsploraVout {
    scriptpubkey: String,
    value: u64,
}

/// Async client for an Esplora HTTP API.
pub struct EsploraClient {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl EsploraClient {
    /// `base_url` is the API root, e.g. `https://blockstream.info/api`.
    /// Every request made by this client is bounded by `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("piggybank/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Transport(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            timeout,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "esplora request");
        self.client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))
    }

    async fn json<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T, ProviderError> {
        let response = self.require_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))
    }

    async fn require_success(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ChainStateProvider for EsploraClient {
    async fn list_unspent(&self, address: &str) -> Result<Vec<UnspentOutput>, ProviderError> {
        let response = self.get(&format!("/address/{address}/utxo")).await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(address, "no data for address");
            return Ok(Vec::new());
        }

        let listed: Vec<EsploraUtxo> = self.json(response).await?;
        listed
            .into_iter()
            .map(|u| {
                let txid = Txid::from_str(&u.txid).map_err(|e| {
                    ProviderError::Malformed(format!("invalid txid '{}': {e}", u.txid))
                })?;
                Ok(UnspentOutput {
                    txid,
                    vout: u.vout,
                    value_sat: u.value,
                })
            })
            .collect()
    }

    async fn transaction_outputs(&self, txid: &Txid) -> Result<Vec<TxOutput>, ProviderError> {
        let response = self.get(&format!("/tx/{txid}")).await?;
        let tx: EsploraTx = self.json(response).await?;

        tx.vout
            .into_iter()
            .map(|out| {
                let script = hex::decode(&out.scriptpubkey).map_err(|e| {
                    ProviderError::Malformed(format!("invalid scriptpubkey hex in {txid}: {e}"))
                })?;
                Ok(TxOutput {
                    script_pubkey: ScriptBuf::from_bytes(script),
                    value_sat: out.value,
                })
            })
            .collect()
    }

    async fn address_info(&self, address: &str) -> Result<AddressInfo, ProviderError> {
        let response = self.get(&format!("/address/{address}")).await?;
        let mut info: AddressInfo = self.json(response).await?;
        info.address = address.to_string();
        Ok(info)
    }
}

#[async_trait]
impl Broadcaster for EsploraClient {
    async fn submit(&self, tx_hex: &str) -> Result<String, BroadcastError> {
        let url = format!("{}/tx", self.base_url);
        tracing::debug!(%url, bytes = tx_hex.len() / 2, "broadcasting transaction");

        let response = self
            .client
            .post(&url)
            .body(tx_hex.to_string())
            .send()
            .await
            .map_err(|e| BroadcastError::Unreachable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BroadcastError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            return Err(BroadcastError::Rejected {
                status: status.as_u16(),
                message: body,
            });
        }

        // Esplora answers with the txid as plain text.
        Ok(body.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = EsploraClient::new("https://blockstream.info/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "https://blockstream.info/api");
    }

    #[test]
    fn esplora_tx_json_parses() {
        let json = r#"{
            "txid": "aa",
            "version": 2,
            "vout": [
                {"scriptpubkey": "0014751e76e8199196d454941c45d1b3a323f1433bd6", "scriptpubkey_type": "v0_p2wpkh", "value": 1000},
                {"scriptpubkey": "6a", "scriptpubkey_type": "op_return", "value": 0}
            ]
        }"#;
        let tx: EsploraTx = serde_json::from_str(json).unwrap();
        assert_eq!(tx.vout.len(), 2);
        assert_eq!(tx.vout[0].value, 1000);
    }

    #[test]
    fn esplora_utxo_json_parses() {
        let json = r#"[{"txid": "ab", "vout": 3, "value": 1234, "status": {"confirmed": true, "block_height": 800000}}]"#;
        let utxos: Vec<EsploraUtxo> = serde_json::from_str(json).unwrap();
        assert_eq!(utxos[0].vout, 3);
        assert_eq!(utxos[0].value, 1234);
    }
}

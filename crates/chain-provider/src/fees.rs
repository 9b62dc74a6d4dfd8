use std::time::Duration;

use async_trait::async_trait;
use chain_btc::FeeRate;

use crate::error::ProviderError;
use crate::provider::FeeRateSource;
use crate::retry::retry_once;
use crate::types::{FeePriority, RecommendedFees};

/// Recommended-fee endpoint in the mempool.space format.
pub struct MempoolFeeSource {
    url: String,
    priority: FeePriority,
    timeout: Duration,
    client: reqwest::Client,
}

impl MempoolFeeSource {
    /// `url` is the full endpoint, e.g. `https://mempool.space/api/v1/fees/recommended`.
    pub fn new(
        url: impl Into<String>,
        priority: FeePriority,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("piggybank/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Transport(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            priority,
            timeout,
            client,
        })
    }

    pub async fn recommended(&self) -> Result<RecommendedFees, ProviderError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))
    }
}

#[async_trait]
impl FeeRateSource for MempoolFeeSource {
    async fn fee_rate(&self) -> Result<FeeRate, ProviderError> {
        let fees = self.recommended().await?;
        let rate = fees.for_priority(self.priority);
        tracing::debug!(priority = %self.priority, rate, "recommended fee rate");
        FeeRate::from_sat_per_vb(rate).map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

/// A fee rate chosen by the operator. Never fails.
#[derive(Debug, Clone, Copy)]
pub struct FixedFeeRate(pub FeeRate);

#[async_trait]
impl FeeRateSource for FixedFeeRate {
    async fn fee_rate(&self) -> Result<FeeRate, ProviderError> {
        Ok(self.0)
    }
}

/// Query `source` with the same timeout and single-retry policy as chain-state calls.
pub async fn lookup_fee_rate<S>(source: &S, timeout: Duration) -> Result<FeeRate, ProviderError>
where
    S: FeeRateSource + ?Sized,
{
    retry_once("fee_rate", timeout, || source.fee_rate()).await
}

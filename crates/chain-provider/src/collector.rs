use std::collections::hash_map::{Entry, HashMap};
use std::time::Duration;

use bitcoin::Txid;
use chain_btc::{DerivedAddress, Utxo, UtxoSet};
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::error::ProviderError;
use crate::provider::ChainStateProvider;
use crate::retry::retry_once;
use crate::types::{AddressInfo, TxOutput};

pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Gathers the UTXOs of a set of derived addresses.
///
/// Addresses are queried concurrently, at most `concurrency` at a time. Any
/// call that still fails after its single retry aborts the whole collection:
/// a partial set is never returned.
pub struct UtxoCollector<'a, P: ?Sized> {
    provider: &'a P,
    concurrency: usize,
    timeout: Duration,
}

impl<'a, P> UtxoCollector<'a, P>
where
    P: ChainStateProvider + ?Sized,
{
    pub fn new(provider: &'a P) -> Self {
        Self {
            provider,
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Per-call timeout. Applies to each attempt separately.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn collect(&self, addresses: &[DerivedAddress]) -> Result<UtxoSet, ProviderError> {
        let per_address: Vec<UtxoSet> = stream::iter(addresses)
            .map(|address| self.collect_address(address))
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        let mut merged = UtxoSet::new();
        for set in per_address {
            merged.merge(set);
        }

        tracing::info!(
            addresses = addresses.len(),
            utxos = merged.len(),
            total_sat = merged.total_sat().unwrap_or(u64::MAX),
            "collected UTXOs"
        );
        Ok(merged)
    }

    /// Address statistics for each address, in input order.
    pub async fn address_info(
        &self,
        addresses: &[DerivedAddress],
    ) -> Result<Vec<AddressInfo>, ProviderError> {
        stream::iter(addresses)
            .map(|address| {
                retry_once("address_info", self.timeout, move || {
                    self.provider.address_info(&address.address)
                })
            })
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    async fn collect_address(&self, address: &DerivedAddress) -> Result<UtxoSet, ProviderError> {
        let listed = retry_once("list_unspent", self.timeout, || {
            self.provider.list_unspent(&address.address)
        })
        .await?;

        let mut set = UtxoSet::new();
        if listed.is_empty() {
            tracing::debug!(index = address.index, address = %address.address, "no UTXOs");
            return Ok(set);
        }

        let mut transactions: HashMap<Txid, Vec<TxOutput>> = HashMap::new();
        for unspent in listed {
            let txid = unspent.txid;
            let outputs: &Vec<TxOutput> = match transactions.entry(txid) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let outputs = retry_once("transaction_outputs", self.timeout, || {
                        self.provider.transaction_outputs(&txid)
                    })
                    .await?;
                    entry.insert(outputs)
                }
            };

            let output = outputs.get(unspent.vout as usize).ok_or_else(|| {
                ProviderError::Malformed(format!(
                    "{txid}:{} listed as unspent but the transaction has {} outputs",
                    unspent.vout,
                    outputs.len()
                ))
            })?;

            if output.value_sat != unspent.value_sat {
                return Err(ProviderError::Malformed(format!(
                    "{txid}:{} listed with {} sat but the transaction pays {} sat",
                    unspent.vout, unspent.value_sat, output.value_sat
                )));
            }

            if output.script_pubkey != address.script_pubkey {
                tracing::warn!(
                    %txid,
                    vout = unspent.vout,
                    address = %address.address,
                    "spent script differs from the derived address script"
                );
            }

            set.insert(Utxo {
                txid,
                vout: unspent.vout,
                amount_sat: output.value_sat,
                script_pubkey: output.script_pubkey.clone(),
            });
        }

        tracing::debug!(
            index = address.index,
            address = %address.address,
            utxos = set.len(),
            "resolved UTXOs"
        );
        Ok(set)
    }
}

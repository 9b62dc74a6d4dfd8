use chain_btc::DerivedAddress;
use chain_provider::AddressInfo;

/// Snapshot of the savings held by the derived addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavingsStatus {
    /// Confirmed plus pending balance across all scanned addresses.
    pub balance_sat: u64,
    /// Unspent outputs across all scanned addresses.
    pub utxo_count: u64,
    /// First address no transaction has touched, if any.
    pub next_address: Option<DerivedAddress>,
    pub addresses_scanned: usize,
    pub full_threshold: u64,
}

impl SavingsStatus {
    /// `infos[i]` must describe `addresses[i]`.
    pub fn from_address_info(
        addresses: &[DerivedAddress],
        infos: &[AddressInfo],
        full_threshold: u64,
    ) -> Self {
        let balance_sat = infos
            .iter()
            .fold(0u64, |acc, info| acc.saturating_add(info.total_balance()));
        let utxo_count = infos
            .iter()
            .fold(0u64, |acc, info| acc.saturating_add(info.unspent_count()));
        let next_address = addresses
            .iter()
            .zip(infos)
            .find(|(_, info)| info.is_unused())
            .map(|(address, _)| address.clone());

        Self {
            balance_sat,
            utxo_count,
            next_address,
            addresses_scanned: addresses.len(),
            full_threshold,
        }
    }

    /// Enough outputs have accumulated that it is time to consolidate.
    pub fn is_full(&self) -> bool {
        self.utxo_count >= self.full_threshold
    }

    pub fn lines(&self) -> Vec<String> {
        let next = match &self.next_address {
            Some(address) => format!("{} {}", address.index, address.address),
            None => "none".to_string(),
        };
        vec![
            format!("balance_sat {}", self.balance_sat),
            format!("utxo_count {}", self.utxo_count),
            format!("next_address {next}"),
            format!("full {}", self.is_full()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::script::ScriptBuf;
    use chain_provider::ChainStats;

    fn address(index: u32) -> DerivedAddress {
        DerivedAddress {
            index,
            script_pubkey: ScriptBuf::new(),
            address: format!("bc1qaddr{index}"),
        }
    }

    fn info(funded: u64, spent: u64, sum: u64, tx_count: u64) -> AddressInfo {
        AddressInfo {
            address: String::new(),
            chain_stats: ChainStats {
                funded_txo_count: funded,
                funded_txo_sum: sum,
                spent_txo_count: spent,
                spent_txo_sum: 0,
                tx_count,
            },
            mempool_stats: ChainStats::default(),
        }
    }

    #[test]
    fn aggregates_and_finds_first_unused() {
        let addresses: Vec<_> = (0..4).map(address).collect();
        let infos = vec![
            info(2, 0, 20_000, 2),
            info(1, 1, 0, 2),
            info(0, 0, 0, 0),
            info(0, 0, 0, 0),
        ];

        let status = SavingsStatus::from_address_info(&addresses, &infos, 21);
        assert_eq!(status.balance_sat, 20_000);
        assert_eq!(status.utxo_count, 2);
        assert_eq!(status.next_address.as_ref().unwrap().index, 2);
        assert!(!status.is_full());
        assert_eq!(
            status.lines(),
            vec![
                "balance_sat 20000",
                "utxo_count 2",
                "next_address 2 bc1qaddr2",
                "full false"
            ]
        );
    }

    #[test]
    fn absurd_provider_counts_saturate() {
        let addresses: Vec<_> = (0..2).map(address).collect();
        let infos = vec![info(u64::MAX, 0, u64::MAX, 1), info(7, 0, 9, 1)];

        let status = SavingsStatus::from_address_info(&addresses, &infos, 21);
        assert_eq!(status.utxo_count, u64::MAX);
        assert_eq!(status.balance_sat, u64::MAX);
        assert!(status.is_full());
    }

    #[test]
    fn full_when_threshold_reached() {
        let addresses: Vec<_> = (0..3).map(address).collect();
        let infos = vec![info(1, 0, 1, 1), info(1, 0, 1, 1), info(1, 0, 1, 1)];

        let status = SavingsStatus::from_address_info(&addresses, &infos, 3);
        assert!(status.is_full());
        assert!(status.next_address.is_none());
        assert_eq!(status.lines()[2], "next_address none");
    }
}

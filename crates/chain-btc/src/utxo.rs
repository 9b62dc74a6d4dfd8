use std::collections::btree_map::{BTreeMap, Entry};

use bitcoin::script::ScriptBuf;
use bitcoin::{OutPoint, Txid};

/// A single unspent transaction output (UTXO) owned by one of the derived addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub txid: Txid,
    /// Output index within the transaction.
    pub vout: u32,
    /// Value in satoshis.
    pub amount_sat: u64,
    /// The locking script of the output being spent.
    pub script_pubkey: ScriptBuf,
}

impl Utxo {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid, self.vout)
    }
}

/// Set of UTXOs keyed by outpoint.
///
/// Each outpoint appears at most once. Iteration is in canonical outpoint
/// order, so two sets holding the same outpoints iterate identically no matter
/// how they were assembled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoSet {
    entries: BTreeMap<OutPoint, Utxo>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a UTXO. Returns `false` if its outpoint was already present, in
    /// which case the set is unchanged.
    pub fn insert(&mut self, utxo: Utxo) -> bool {
        match self.entries.entry(utxo.outpoint()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(utxo);
                true
            }
        }
    }

    /// Union with another set. Commutative and associative over outpoints.
    pub fn merge(&mut self, other: UtxoSet) {
        for utxo in other.entries.into_values() {
            self.insert(utxo);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.entries.contains_key(outpoint)
    }

    /// Sum of all amounts. `None` on overflow, which no real chain state can produce.
    pub fn total_sat(&self) -> Option<u64> {
        self.entries
            .values()
            .try_fold(0u64, |acc, u| acc.checked_add(u.amount_sat))
    }

    /// UTXOs in canonical outpoint order.
    pub fn iter(&self) -> impl Iterator<Item = &Utxo> {
        self.entries.values()
    }
}

impl FromIterator<Utxo> for UtxoSet {
    fn from_iter<I: IntoIterator<Item = Utxo>>(iter: I) -> Self {
        let mut set = UtxoSet::new();
        for utxo in iter {
            set.insert(utxo);
        }
        set
    }
}

impl Extend<Utxo> for UtxoSet {
    fn extend<I: IntoIterator<Item = Utxo>>(&mut self, iter: I) {
        for utxo in iter {
            self.insert(utxo);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;

    fn make_utxo(tag: u8, vout: u32, amount_sat: u64) -> Utxo {
        Utxo {
            txid: Txid::from_byte_array([tag; 32]),
            vout,
            amount_sat,
            script_pubkey: ScriptBuf::from_bytes(vec![0x00; 22]),
        }
    }

    #[test]
    fn duplicate_outpoint_is_ignored() {
        let mut set = UtxoSet::new();
        assert!(set.insert(make_utxo(1, 0, 10_000)));
        assert!(!set.insert(make_utxo(1, 0, 10_000)));
        assert_eq!(set.len(), 1);
        assert_eq!(set.total_sat(), Some(10_000));
    }

    #[test]
    fn same_txid_different_vout_are_distinct() {
        let set: UtxoSet = [make_utxo(1, 0, 1_000), make_utxo(1, 1, 2_000)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
        assert_eq!(set.total_sat(), Some(3_000));
    }

    #[test]
    fn merge_is_commutative() {
        let a: UtxoSet = [make_utxo(1, 0, 1_000), make_utxo(2, 0, 2_000)]
            .into_iter()
            .collect();
        let b: UtxoSet = [make_utxo(2, 0, 2_000), make_utxo(3, 1, 3_000)]
            .into_iter()
            .collect();

        let mut ab = a.clone();
        ab.merge(b.clone());
        let mut ba = b;
        ba.merge(a);

        assert_eq!(ab, ba);
        assert_eq!(ab.len(), 3);
        assert_eq!(ab.total_sat(), Some(6_000));
    }

    #[test]
    fn iteration_order_is_independent_of_insertion_order() {
        let forward: UtxoSet = [make_utxo(3, 0, 1), make_utxo(1, 2, 1), make_utxo(1, 0, 1)]
            .into_iter()
            .collect();
        let reverse: UtxoSet = [make_utxo(1, 0, 1), make_utxo(1, 2, 1), make_utxo(3, 0, 1)]
            .into_iter()
            .collect();

        let f: Vec<_> = forward.iter().map(Utxo::outpoint).collect();
        let r: Vec<_> = reverse.iter().map(Utxo::outpoint).collect();
        assert_eq!(f, r);
        assert!(f.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn empty_set() {
        let set = UtxoSet::new();
        assert!(set.is_empty());
        assert_eq!(set.total_sat(), Some(0));
        assert_eq!(set.iter().count(), 0);
    }

    #[test]
    fn total_overflow_is_reported() {
        let set: UtxoSet = [make_utxo(1, 0, u64::MAX), make_utxo(2, 0, 1)]
            .into_iter()
            .collect();
        assert_eq!(set.total_sat(), None);
    }

    #[test]
    fn contains_and_extend() {
        let mut set = UtxoSet::new();
        set.extend([make_utxo(4, 7, 500), make_utxo(4, 7, 500)]);
        assert_eq!(set.len(), 1);
        assert!(set.contains(&make_utxo(4, 7, 0).outpoint()));
    }
}

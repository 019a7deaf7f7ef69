//! Instrument Store
//!
//! The broker's authoritative cache of current instrument state. Records
//! are kept in insertion order so snapshots are stable across calls.
//!
//! # Design
//!
//! A single `RwLock` guards both the ordered records and the code index.
//! Snapshots clone under the read lock, so a snapshot is never torn by a
//! concurrent upsert and always reflects every upsert that completed
//! before it was taken.

use std::collections::HashMap;

use parking_lot::RwLock;
use rust_decimal::Decimal;

use super::instrument::Instrument;

/// Result of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The code was unseen and a record was appended.
    Inserted,
    /// An existing record was overwritten in place.
    Updated,
}

#[derive(Debug, Default)]
struct StoreState {
    records: Vec<Instrument>,
    index: HashMap<String, usize>,
}

impl StoreState {
    fn upsert(&mut self, code: &str, name: &str, price: Decimal) -> UpsertOutcome {
        if let Some(&position) = self.index.get(code) {
            let record = &mut self.records[position];
            name.clone_into(&mut record.name);
            record.price = price;
            return UpsertOutcome::Updated;
        }

        self.index.insert(code.to_string(), self.records.len());
        self.records.push(Instrument {
            code: code.to_string(),
            name: name.to_string(),
            price,
        });
        UpsertOutcome::Inserted
    }
}

/// Thread-safe store of current instrument state.
///
/// # Example
///
/// ```rust
/// use price_ticker::domain::store::{InstrumentStore, UpsertOutcome};
/// use rust_decimal::Decimal;
///
/// let store = InstrumentStore::new();
/// assert_eq!(store.upsert("AAA", "Acme", Decimal::new(1000, 2)), UpsertOutcome::Inserted);
/// assert_eq!(store.upsert("AAA", "Acme", Decimal::new(1550, 2)), UpsertOutcome::Updated);
///
/// let snapshot = store.snapshot();
/// assert_eq!(snapshot.len(), 1);
/// assert_eq!(snapshot[0].price, Decimal::new(1550, 2));
/// ```
#[derive(Debug, Default)]
pub struct InstrumentStore {
    state: RwLock<StoreState>,
}

impl InstrumentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Point-in-time copy of every tracked instrument, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Instrument> {
        self.state.read().records.clone()
    }

    /// Insert `code` if unseen, otherwise overwrite its name and price.
    pub fn upsert(&self, code: &str, name: &str, price: Decimal) -> UpsertOutcome {
        self.state.write().upsert(code, name, price)
    }

    /// Upsert a batch of instruments under one write lock.
    ///
    /// Returns the number of newly inserted codes.
    pub fn load(&self, instruments: impl IntoIterator<Item = Instrument>) -> usize {
        let mut state = self.state.write();
        instruments
            .into_iter()
            .filter(|i| state.upsert(&i.code, &i.name, i.price) == UpsertOutcome::Inserted)
            .count()
    }

    /// Current record for `code`, if tracked.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<Instrument> {
        let state = self.state.read();
        state
            .index
            .get(code)
            .map(|&position| state.records[position].clone())
    }

    /// Number of tracked instruments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    /// Whether no instruments are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn empty_store_snapshot_is_empty() {
        let store = InstrumentStore::new();
        assert!(store.snapshot().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn snapshot_preserves_insertion_order() {
        let store = InstrumentStore::new();
        store.upsert("BBB", "Bravo", dec!(20.00));
        store.upsert("AAA", "Alpha", dec!(10.00));
        store.upsert("CCC", "Charlie", dec!(30.00));

        let codes: Vec<_> = store.snapshot().into_iter().map(|i| i.code).collect();
        assert_eq!(codes, vec!["BBB", "AAA", "CCC"]);
    }

    #[test]
    fn update_overwrites_in_place() {
        let store = InstrumentStore::new();
        store.upsert("AAA", "Alpha", dec!(10.00));
        store.upsert("BBB", "Bravo", dec!(20.00));

        let outcome = store.upsert("AAA", "Alpha Corp", dec!(11.25));

        assert_eq!(outcome, UpsertOutcome::Updated);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].code, "AAA");
        assert_eq!(snapshot[0].name, "Alpha Corp");
        assert_eq!(snapshot[0].price, dec!(11.25));
    }

    #[test]
    fn snapshot_is_a_copy() {
        let store = InstrumentStore::new();
        store.upsert("AAA", "Alpha", dec!(10.00));

        let before = store.snapshot();
        store.upsert("AAA", "Alpha", dec!(99.00));

        assert_eq!(before[0].price, dec!(10.00));
        assert_eq!(store.get("AAA").unwrap().price, dec!(99.00));
    }

    #[test]
    fn load_counts_only_new_codes() {
        let store = InstrumentStore::new();
        store.upsert("AAA", "Alpha", dec!(1));

        let inserted = store.load(vec![
            Instrument::new("AAA", "Alpha", dec!(2)).unwrap(),
            Instrument::new("BBB", "Bravo", dec!(3)).unwrap(),
        ]);

        assert_eq!(inserted, 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("AAA").unwrap().price, dec!(2));
    }

    #[test]
    fn get_unknown_code_is_none() {
        assert!(InstrumentStore::new().get("ZZZ").is_none());
    }

    #[test]
    fn concurrent_upserts_keep_one_record_per_code() {
        let store = Arc::new(InstrumentStore::new());
        let mut handles = vec![];

        for i in 0..8u32 {
            let s = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for n in 0..100u32 {
                    s.upsert(&format!("SYM{}", n % 10), "Shared", Decimal::from(i * n));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 10);
    }

    proptest! {
        #[test]
        fn at_most_one_record_per_code(
            ops in proptest::collection::vec((0u8..6, 0u32..10_000), 0..200)
        ) {
            let store = InstrumentStore::new();
            for (code, cents) in &ops {
                store.upsert(&format!("C{code}"), "n", Decimal::new(i64::from(*cents), 2));
            }

            let snapshot = store.snapshot();
            let unique: HashSet<_> = snapshot.iter().map(|i| i.code.clone()).collect();
            prop_assert_eq!(unique.len(), snapshot.len());

            // Each code carries the last price written to it.
            for instrument in &snapshot {
                let last = ops
                    .iter()
                    .rev()
                    .find(|(code, _)| format!("C{code}") == instrument.code)
                    .map(|(_, cents)| Decimal::new(i64::from(*cents), 2));
                prop_assert_eq!(Some(instrument.price), last);
            }
        }
    }
}

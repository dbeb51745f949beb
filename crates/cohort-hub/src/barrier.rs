//! Barrier bookkeeping.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Remaining-arrival counters, keyed by barrier tag.
///
/// Entries are ephemeral: the first arrival for a tag creates its counter
/// at the cohort size, every arrival decrements it, and the arrival that
/// drives it to zero removes the entry. Once removed, no further releases
/// are produced for that tag until a fresh round recreates it.
#[derive(Default)]
pub struct BarrierTable {
    counters: Mutex<HashMap<i64, u64>>,
}

impl BarrierTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one arrival at `tag`. Returns true when this arrival
    /// completed the barrier, in which case the caller fans out releases.
    pub fn arrive(&self, tag: i64, cohort: u64) -> bool {
        let mut counters = self.counters.lock();
        let remaining = counters.entry(tag).or_insert(cohort);
        *remaining -= 1;
        if *remaining == 0 {
            counters.remove(&tag);
            true
        } else {
            false
        }
    }

    /// Number of barriers currently waiting on arrivals.
    pub fn open_count(&self) -> usize {
        self.counters.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_on_last_arrival() {
        let table = BarrierTable::new();
        assert!(!table.arrive(30, 3));
        assert!(!table.arrive(30, 3));
        assert!(table.arrive(30, 3));
        assert_eq!(table.open_count(), 0);
    }

    #[test]
    fn entry_is_removed_at_zero() {
        let table = BarrierTable::new();
        assert!(table.arrive(5, 1));
        // A new round for the same tag starts from the full cohort again.
        assert!(!table.arrive(5, 2));
        assert!(table.arrive(5, 2));
    }

    #[test]
    fn tags_are_independent() {
        let table = BarrierTable::new();
        assert!(!table.arrive(1, 2));
        assert!(!table.arrive(2, 2));
        assert_eq!(table.open_count(), 2);
        assert!(table.arrive(2, 2));
        assert_eq!(table.open_count(), 1);
        assert!(table.arrive(1, 2));
        assert_eq!(table.open_count(), 0);
    }
}

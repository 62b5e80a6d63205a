use crate::sample::{Series, Snapshot};
use std::sync::Arc;

/// Last successfully applied series. Holds at most one symbol.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: Option<Arc<Snapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored snapshot wholesale.
    pub fn replace(&mut self, symbol: &str, series: Series) -> Arc<Snapshot> {
        let snap = Arc::new(Snapshot {
            symbol: symbol.to_string(),
            series,
        });
        self.current = Some(snap.clone());
        snap
    }

    pub fn get(&self) -> Option<&Arc<Snapshot>> {
        self.current.as_ref()
    }

    pub fn for_symbol(&self, symbol: &str) -> Option<&Arc<Snapshot>> {
        self.current.as_ref().filter(|s| s.symbol == symbol)
    }

    /// True when nothing has been shown yet for `symbol`.
    pub fn is_empty_for(&self, symbol: &str) -> bool {
        self.for_symbol(symbol)
            .map(|s| s.series.is_empty())
            .unwrap_or(true)
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Sample;

    fn one(time: i64) -> Series {
        Series::from_sorted(vec![Sample {
            time,
            value: 20.0,
            aux_a: None,
            aux_b: None,
        }])
    }

    #[test]
    fn replace_is_wholesale_and_symbol_scoped() {
        let mut store = SnapshotStore::new();
        assert!(store.is_empty_for("A"));
        store.replace("A", one(100));
        store.replace("A", one(200));
        assert_eq!(store.for_symbol("A").unwrap().series.last_time(), Some(200));
        assert!(store.for_symbol("B").is_none());
        assert!(!store.is_empty_for("A"));
        store.clear();
        assert!(store.get().is_none());
    }
}

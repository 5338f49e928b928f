//! In-memory backend: a sorted vector of pairs.

use tupledb_error::{Result, TupleDbError};
use tupledb_types::{sorted, KeyValuePair, Writes};

use crate::{StorageScanArgs, TupleStorage};

/// Sorted in-memory storage. The reference backend: every other backend
/// must be observationally equivalent to this one.
#[derive(Debug, Clone)]
pub struct MemoryStorage<V> {
    pairs: Vec<KeyValuePair<V>>,
    closed: bool,
}

impl<V> MemoryStorage<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pairs: Vec::new(),
            closed: false,
        }
    }

    /// Number of stored pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(TupleDbError::DatabaseClosed)
        } else {
            Ok(())
        }
    }
}

impl<V> Default for MemoryStorage<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync + 'static> TupleStorage for MemoryStorage<V> {
    type Value = V;

    fn scan(&self, args: &StorageScanArgs) -> Result<Vec<KeyValuePair<V>>> {
        self.check_open()?;
        Ok(sorted::scan_pairs(
            &self.pairs,
            &args.bounds,
            args.reverse,
            args.limit,
        ))
    }

    fn commit(&mut self, writes: Writes<V>) -> Result<()> {
        self.check_open()?;
        let (set, remove) = writes.into_parts();
        for key in &remove {
            sorted::remove_pair(&mut self.pairs, key);
        }
        for pair in set {
            sorted::upsert_pair(&mut self.pairs, pair.key, pair.value);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.pairs.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tupledb_types::tuple;

    use super::*;

    #[test]
    fn commit_applies_both_sides() {
        let mut storage = MemoryStorage::new();
        let mut writes = Writes::new();
        writes.set(tuple!["a"], 1);
        writes.set(tuple!["b"], 2);
        storage.commit(writes).unwrap();
        assert_eq!(storage.len(), 2);

        let mut writes = Writes::new();
        writes.remove(tuple!["a"]);
        writes.set(tuple!["c"], 3);
        storage.commit(writes).unwrap();

        let all = storage.scan(&StorageScanArgs::default()).unwrap();
        assert_eq!(
            all.iter().map(|p| p.key.clone()).collect::<Vec<_>>(),
            vec![tuple!["b"], tuple!["c"]]
        );
    }

    #[test]
    fn close_is_terminal() {
        let mut storage = MemoryStorage::<i64>::new();
        storage.close().unwrap();
        assert!(matches!(
            storage.scan(&StorageScanArgs::default()),
            Err(TupleDbError::DatabaseClosed)
        ));
    }
}

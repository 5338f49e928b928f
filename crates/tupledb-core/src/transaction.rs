//! Buffered-write transactions with read-your-writes overlay.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tupledb_error::{Result, TerminalState, TupleDbError};
use tupledb_storage::TupleStorage;
use tupledb_types::{sorted, subspace, Bounds, KeyValuePair, ScanArgs, Tuple, Writes};

use crate::client::point_result;
use crate::concurrency::TxId;
use crate::database::TupleDatabase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Active,
    Committed,
    Canceled,
}

pub(crate) struct TxShared<V> {
    id: TxId,
    state: Mutex<TxState<V>>,
}

struct TxState<V> {
    writes: Writes<V>,
    status: Status,
}

impl<V> TxShared<V> {
    pub(crate) fn new() -> Self {
        Self {
            id: TxId::allocate(),
            state: Mutex::new(TxState {
                writes: Writes::new(),
                status: Status::Active,
            }),
        }
    }

    pub(crate) const fn id(&self) -> TxId {
        self.id
    }

    fn closed_error(&self, status: Status) -> TupleDbError {
        TupleDbError::TransactionClosed {
            tx: self.id.get(),
            state: match status {
                Status::Committed => TerminalState::Committed,
                // `Active` never reaches here.
                Status::Canceled | Status::Active => TerminalState::Canceled,
            },
        }
    }

    fn active(&self) -> Result<parking_lot::MutexGuard<'_, TxState<V>>> {
        let state = self.state.lock();
        if state.status == Status::Active {
            Ok(state)
        } else {
            Err(self.closed_error(state.status))
        }
    }

    pub(crate) fn buffer_set(&self, key: Tuple, value: V) -> Result<()> {
        self.active()?.writes.set(key, value);
        Ok(())
    }

    pub(crate) fn buffer_remove(&self, key: Tuple) -> Result<()> {
        self.active()?.writes.remove(key);
        Ok(())
    }

    /// Run `f` against the buffered writes while the transaction is active.
    pub(crate) fn with_writes<T>(&self, f: impl FnOnce(&Writes<V>) -> T) -> Result<T> {
        let state = self.active()?;
        Ok(f(&state.writes))
    }

    /// Snapshot the buffer for a commit attempt. The buffer stays intact
    /// so a failed commit leaves the transaction cancelable.
    pub(crate) fn take_writes_for_commit(&self) -> Result<Writes<V>>
    where
        V: Clone,
    {
        Ok(self.active()?.writes.clone())
    }

    pub(crate) fn mark_committed(&self) {
        let mut state = self.state.lock();
        state.status = Status::Committed;
        state.writes.clear();
    }

    pub(crate) fn mark_canceled(&self) -> Result<()> {
        let mut state = self.active()?;
        state.status = Status::Canceled;
        state.writes.clear();
        Ok(())
    }
}

impl<V: Clone> TxShared<V> {
    /// The buffered state of `key`: `Some(Some(v))` for a pending set,
    /// `Some(None)` for a pending remove, `None` if untouched.
    pub(crate) fn buffered(&self, key: &Tuple) -> Result<Option<Option<V>>> {
        let state = self.active()?;
        Ok(state.writes.get(key).map(|entry| entry.cloned()))
    }
}

/// Apply a transaction's buffered writes on top of a storage scan.
///
/// `rows` is the storage result for `bounds` in ascending order; the
/// return value is the overlaid view with `limit` reapplied. Pure, so the
/// sync and async transaction flavors share it.
pub(crate) fn overlay_scan<V: Clone>(
    mut rows: Vec<KeyValuePair<V>>,
    writes: &Writes<V>,
    bounds: &Bounds,
    reverse: bool,
    limit: Option<usize>,
) -> Vec<KeyValuePair<V>> {
    if reverse {
        rows.reverse();
    }
    for pair in writes.sets() {
        if bounds.contains(&pair.key) {
            sorted::upsert_pair(&mut rows, pair.key.clone(), pair.value.clone());
        }
    }
    for key in writes.removes() {
        if bounds.contains(key) {
            sorted::remove_pair(&mut rows, key);
        }
    }
    if reverse {
        rows.reverse();
    }
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    rows
}

/// A transaction over a [`TupleDatabase`].
///
/// Writes buffer locally until `commit` submits them as one batch; reads
/// overlay the buffer on storage, so a transaction always sees its own
/// pending writes. Clones (and `subspace` views) share the same buffer
/// and id. After `commit` or `cancel` every operation fails with
/// [`TupleDbError::TransactionClosed`].
pub struct Transaction<S: TupleStorage> {
    db: TupleDatabase<S>,
    prefix: Tuple,
    shared: Arc<TxShared<S::Value>>,
}

impl<S: TupleStorage> Clone for Transaction<S> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            prefix: self.prefix.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: TupleStorage> fmt::Debug for Transaction<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.shared.id())
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl<S: TupleStorage> Transaction<S> {
    pub(crate) fn new(db: TupleDatabase<S>, prefix: Tuple) -> Self {
        Self {
            db,
            prefix,
            shared: Arc::new(TxShared::new()),
        }
    }

    #[must_use]
    pub fn id(&self) -> TxId {
        self.shared.id()
    }

    /// A view of this transaction under an extended prefix. The view
    /// shares this transaction's buffer, id and fate.
    #[must_use]
    pub fn subspace(&self, prefix: &Tuple) -> Self {
        Self {
            db: self.db.clone(),
            prefix: self.prefix.concat(prefix),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Buffer a set. Cancels any pending remove of the same key.
    pub fn set(&self, key: &Tuple, value: S::Value) -> Result<()> {
        self.shared
            .buffer_set(subspace::prepend_prefix(&self.prefix, key), value)
    }

    /// Buffer a remove. Cancels any pending set of the same key.
    pub fn remove(&self, key: &Tuple) -> Result<()> {
        self.shared
            .buffer_remove(subspace::prepend_prefix(&self.prefix, key))
    }

    /// Scan through the transaction: storage results (read-logged under
    /// this transaction's id) overlaid with the buffered writes.
    pub fn scan(&self, args: &ScanArgs) -> Result<Vec<KeyValuePair<S::Value>>> {
        let full = subspace::prepend_prefix_to_scan_args(&self.prefix, args);
        let bounds = full.bounds();
        let rows = self.db.scan(&full, Some(self.shared.id()))?;
        let rows = self.shared.with_writes(|writes| {
            overlay_scan(rows, writes, &bounds, args.reverse, args.limit)
        })?;
        Ok(subspace::remove_prefix_from_pairs(&self.prefix, rows))
    }

    /// The value at `key`, honoring buffered writes without touching
    /// storage (a buffered set or remove short-circuits the read).
    pub fn get(&self, key: &Tuple) -> Result<Option<S::Value>> {
        let full_key = subspace::prepend_prefix(&self.prefix, key);
        match self.shared.buffered(&full_key)? {
            Some(buffered) => Ok(buffered),
            None => {
                let rows = self.db.scan(
                    &ScanArgs::new().gte(full_key.clone()).lte(full_key),
                    Some(self.shared.id()),
                )?;
                point_result(rows)
            }
        }
    }

    pub fn exists(&self, key: &Tuple) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Submit the buffered batch. On success the transaction is closed;
    /// on a conflict (or storage error) it stays active so the caller can
    /// `cancel` it. The retry wrapper relies on this.
    pub fn commit(&self) -> Result<()> {
        let writes = self.shared.take_writes_for_commit()?;
        self.db.commit(writes, Some(self.shared.id()))?;
        self.shared.mark_committed();
        Ok(())
    }

    /// Abandon the transaction and release its concurrency-log entries.
    pub fn cancel(&self) -> Result<()> {
        self.shared.mark_canceled()?;
        self.db.cancel(self.shared.id())
    }
}

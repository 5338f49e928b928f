//! Application-facing client: a subspace-scoped view over the engine.

use std::fmt;
use std::sync::Arc;

use tupledb_error::{Result, TupleDbError};
use tupledb_storage::TupleStorage;
use tupledb_types::{subspace, KeyValuePair, ScanArgs, Tuple, Writes};

use crate::database::{Subscription, TupleDatabase};
use crate::reactivity::Callback;
use crate::transaction::Transaction;

/// A client over a [`TupleDatabase`], optionally scoped to a subspace.
///
/// All keys going in are prepended with the client's prefix and all keys
/// coming out are stripped of it, so code written against a subspace is
/// oblivious to where in the keyspace it actually lives. Values are the
/// storage backend's value type; applications typically use an enum over
/// their record variants so the compiler rules out ill-typed writes.
pub struct TupleClient<S: TupleStorage> {
    db: TupleDatabase<S>,
    prefix: Tuple,
}

impl<S: TupleStorage> Clone for TupleClient<S> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            prefix: self.prefix.clone(),
        }
    }
}

impl<S: TupleStorage> fmt::Debug for TupleClient<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TupleClient")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl<S: TupleStorage> TupleClient<S> {
    /// A root client (empty prefix) over the engine.
    pub fn new(db: TupleDatabase<S>) -> Self {
        Self {
            db,
            prefix: Tuple::new(),
        }
    }

    /// A new client whose prefix extends this one's. The receiver is
    /// untouched; subspaces nest by composition.
    #[must_use]
    pub fn subspace(&self, prefix: &Tuple) -> Self {
        Self {
            db: self.db.clone(),
            prefix: self.prefix.concat(prefix),
        }
    }

    /// The subspace prefix of this client.
    #[must_use]
    pub fn prefix(&self) -> &Tuple {
        &self.prefix
    }

    pub fn scan(&self, args: &ScanArgs) -> Result<Vec<KeyValuePair<S::Value>>> {
        let full = subspace::prepend_prefix_to_scan_args(&self.prefix, args);
        let rows = self.db.scan(&full, None)?;
        Ok(subspace::remove_prefix_from_pairs(&self.prefix, rows))
    }

    /// The value at exactly `key`, if any.
    pub fn get(&self, key: &Tuple) -> Result<Option<S::Value>> {
        let rows = self.scan(&ScanArgs::new().gte(key.clone()).lte(key.clone()))?;
        point_result(rows)
    }

    pub fn exists(&self, key: &Tuple) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Subscribe to writes intersecting the args' bounds. The callback
    /// sees keys relative to this client's subspace.
    pub fn subscribe(
        &self,
        args: &ScanArgs,
        callback: impl Fn(&Writes<S::Value>) + Send + Sync + 'static,
    ) -> Result<Subscription>
    where
        S: Send + 'static,
    {
        let full = subspace::prepend_prefix_to_scan_args(&self.prefix, args);
        let prefix = self.prefix.clone();
        let scoped: Callback<S::Value> = Arc::new(move |writes: &Writes<S::Value>| {
            let stripped = subspace::remove_prefix_from_writes(&prefix, writes.clone());
            callback(&stripped);
        });
        self.db.subscribe(&full, scoped)
    }

    /// Commit a batch directly, without conflict tracking.
    pub fn commit(&self, writes: Writes<S::Value>) -> Result<()> {
        self.db
            .commit(subspace::prepend_prefix_to_writes(&self.prefix, writes), None)
    }

    /// Abandon a transaction by id, releasing its concurrency-log entries.
    /// Normally reached through [`Transaction::cancel`].
    pub fn cancel(&self, tx: crate::TxId) -> Result<()> {
        self.db.cancel(tx)
    }

    /// Start a buffered-write transaction scoped to this client's prefix.
    #[must_use]
    pub fn transact(&self) -> Transaction<S> {
        Transaction::new(self.db.clone(), self.prefix.clone())
    }

    pub fn close(&self) -> Result<()> {
        self.db.close()
    }
}

/// Collapse a point-range scan into at most one value.
pub(crate) fn point_result<V>(rows: Vec<KeyValuePair<V>>) -> Result<Option<V>> {
    match rows.len() {
        0 => Ok(None),
        1 => Ok(rows.into_iter().next().map(|pair| pair.value)),
        count => Err(TupleDbError::GetExpectedSingle { count }),
    }
}

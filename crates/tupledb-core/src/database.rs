//! The engine: storage, reactivity and concurrency control bound together
//! behind one exclusive lock.
//!
//! Every public method takes the lock, so engine operations are
//! linearizable with respect to each other. Subscription callbacks are the
//! one thing that runs *outside* the lock: a commit computes its fan-out
//! buckets while locked, releases the lock, then invokes the callbacks.
//! This keeps callbacks free to call back into the database, at the cost
//! of no guarantee that they finish before `commit` returns to a
//! concurrent observer.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};
use tupledb_error::{Result, TupleDbError};
use tupledb_storage::{StorageScanArgs, TupleStorage};
use tupledb_types::{KeyValuePair, ScanArgs, Writes};

use crate::concurrency::{ConcurrencyLog, TxId};
use crate::reactivity::{Callback, ReactivityTracker};

struct DbInner<S: TupleStorage> {
    storage: S,
    log: ConcurrencyLog,
    reactivity: ReactivityTracker<S::Value>,
    closed: bool,
}

impl<S: TupleStorage> DbInner<S> {
    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(TupleDbError::DatabaseClosed)
        } else {
            Ok(())
        }
    }
}

/// A reactive, transactional tuple database over a storage backend.
///
/// Cheap to clone; clones share the same underlying database.
pub struct TupleDatabase<S: TupleStorage> {
    inner: Arc<Mutex<DbInner<S>>>,
}

impl<S: TupleStorage> Clone for TupleDatabase<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: TupleStorage> fmt::Debug for TupleDatabase<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TupleDatabase").finish_non_exhaustive()
    }
}

impl<S: TupleStorage> TupleDatabase<S> {
    pub fn new(storage: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DbInner {
                storage,
                log: ConcurrencyLog::default(),
                reactivity: ReactivityTracker::default(),
                closed: false,
            })),
        }
    }

    /// Scan pairs within the args' bounds. When `tx` is given the read is
    /// recorded in the concurrency log before results are produced.
    pub fn scan(&self, args: &ScanArgs, tx: Option<TxId>) -> Result<Vec<KeyValuePair<S::Value>>> {
        let mut inner = self.inner.lock();
        inner.check_open()?;
        let bounds = args.bounds();
        if let Some(tx) = tx {
            inner.log.read(tx, bounds.clone());
        }
        trace!(?tx, "engine scan");
        inner.storage.scan(&StorageScanArgs {
            bounds,
            reverse: args.reverse,
            limit: args.limit,
        })
    }

    /// Atomically validate, apply and fan out a write batch.
    ///
    /// With a `tx`, each write is recorded and the transaction is checked
    /// for read-write conflicts before storage sees anything; a conflict
    /// leaves both the log (minus nothing) and storage untouched.
    pub fn commit(&self, writes: Writes<S::Value>, tx: Option<TxId>) -> Result<()> {
        let emits = {
            let mut inner = self.inner.lock();
            inner.check_open()?;
            if let Some(tx) = tx {
                for key in writes.keys() {
                    inner.log.write(tx, key.clone());
                }
                inner.log.commit(tx)?;
            }
            debug!(?tx, sets = writes.sets().len(), removes = writes.removes().len(), "commit");
            let emits = inner.reactivity.emits_for(&writes);
            inner.storage.commit(writes)?;
            emits
        };
        // Callbacks run outside the lock so they may re-enter the database.
        for (callback, batch) in emits {
            callback(&batch);
        }
        Ok(())
    }

    /// Abandon a transaction, releasing its concurrency-log entries.
    pub fn cancel(&self, tx: TxId) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.check_open()?;
        inner.log.cancel(tx);
        Ok(())
    }

    /// Register a callback for writes intersecting the args' bounds.
    pub fn subscribe(
        &self,
        args: &ScanArgs,
        callback: Callback<S::Value>,
    ) -> Result<Subscription>
    where
        S: Send + 'static,
    {
        let mut inner = self.inner.lock();
        inner.check_open()?;
        let key = inner.reactivity.subscribe(args.bounds(), callback);
        let weak = Arc::downgrade(&self.inner);
        Ok(Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.lock().reactivity.unsubscribe(&key);
            }
        }))
    }

    /// Close the database and its storage. Idempotent; everything after
    /// the first close fails with [`TupleDbError::DatabaseClosed`].
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Ok(());
        }
        inner.closed = true;
        inner.storage.close()
    }
}

/// Handle for removing a subscription.
///
/// `unsubscribe` is idempotent and safe to race against an in-flight emit;
/// the racing emit may be delivered or skipped. Dropping the handle does
/// *not* unsubscribe; the listener stays live for the lifetime of the
/// database.
pub struct Subscription {
    remove: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    pub(crate) fn new(remove: impl FnOnce() + Send + 'static) -> Self {
        Self {
            remove: Mutex::new(Some(Box::new(remove))),
        }
    }

    pub fn unsubscribe(&self) {
        if let Some(remove) = self.remove.lock().take() {
            remove();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.lock().is_some())
            .finish()
    }
}

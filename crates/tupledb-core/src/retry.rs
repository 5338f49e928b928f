//! Retry-on-conflict wrapper for transactional queries.

use tracing::debug;
use tupledb_error::Result;
use tupledb_storage::TupleStorage;

use crate::client::TupleClient;
use crate::transaction::Transaction;

/// Default number of attempts before a conflict is surfaced to the caller.
pub const DEFAULT_ATTEMPTS: usize = 5;

/// The seam that lets a query run against either a client or an existing
/// transaction.
///
/// Against a [`TupleClient`] the query gets a fresh transaction, a commit,
/// and conflict retries. Against a [`Transaction`] it runs directly, with
/// no wrapping and no commit, so transactional helpers compose: a helper called
/// from inside a bigger transaction simply joins it.
pub trait Transactable<S: TupleStorage> {
    fn with_tx<T, F>(&self, f: F) -> Result<T>
    where
        F: Fn(&Transaction<S>) -> Result<T>;
}

impl<S: TupleStorage> Transactable<S> for TupleClient<S> {
    fn with_tx<T, F>(&self, f: F) -> Result<T>
    where
        F: Fn(&Transaction<S>) -> Result<T>,
    {
        transactionally_with_attempts(self, DEFAULT_ATTEMPTS, f)
    }
}

impl<S: TupleStorage> Transactable<S> for Transaction<S> {
    fn with_tx<T, F>(&self, f: F) -> Result<T>
    where
        F: Fn(&Transaction<S>) -> Result<T>,
    {
        f(self)
    }
}

/// Run `f` in a transaction, retrying up to [`DEFAULT_ATTEMPTS`] times on
/// read-write conflicts.
pub fn transactionally<S, T, F>(client: &TupleClient<S>, f: F) -> Result<T>
where
    S: TupleStorage,
    F: Fn(&Transaction<S>) -> Result<T>,
{
    transactionally_with_attempts(client, DEFAULT_ATTEMPTS, f)
}

/// [`transactionally`] with an explicit attempt budget (at least one).
///
/// Each attempt runs `f` against a fresh transaction and commits it if `f`
/// succeeded. Only a [read-write conflict] triggers another attempt; any
/// other error cancels the transaction and surfaces immediately, as does a
/// conflict on the final attempt.
///
/// [read-write conflict]: tupledb_error::TupleDbError::ReadWriteConflict
pub fn transactionally_with_attempts<S, T, F>(
    client: &TupleClient<S>,
    attempts: usize,
    f: F,
) -> Result<T>
where
    S: TupleStorage,
    F: Fn(&Transaction<S>) -> Result<T>,
{
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let tx = client.transact();
        let err = match f(&tx) {
            Ok(value) => match tx.commit() {
                Ok(()) => return Ok(value),
                Err(err) => err,
            },
            Err(err) => err,
        };
        // Release the transaction's log entries before deciding anything.
        let _ = tx.cancel();
        if err.is_conflict() && attempt < attempts {
            debug!(tx = %tx.id(), attempt, "conflict, retrying");
            continue;
        }
        return Err(err);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tupledb_error::TupleDbError;
    use tupledb_storage::MemoryStorage;
    use tupledb_types::{tuple, ScanArgs};

    use super::*;
    use crate::database::TupleDatabase;

    fn client() -> TupleClient<MemoryStorage<i64>> {
        TupleClient::new(TupleDatabase::new(MemoryStorage::new()))
    }

    #[test]
    fn commits_on_first_attempt() {
        let client = client();
        let result = transactionally(&client, |tx| {
            tx.set(&tuple!["a"], 1)?;
            Ok(7)
        })
        .unwrap();
        assert_eq!(result, 7);
        assert_eq!(client.get(&tuple!["a"]).unwrap(), Some(1));
    }

    #[test]
    fn retries_conflicts_until_success() {
        let client = client();
        let mut writes = tupledb_types::Writes::new();
        writes.set(tuple!["score", "a"], 1);
        client.commit(writes).unwrap();

        let tries = AtomicUsize::new(0);
        let sneak = client.clone();
        let total = transactionally(&client, |tx| {
            let sum: i64 = tx
                .scan(&ScanArgs::new().prefix(tuple!["score"]))?
                .iter()
                .map(|p| p.value)
                .sum();
            // The first two attempts race against a concurrent writer.
            let attempt = tries.fetch_add(1, Ordering::SeqCst);
            if attempt < 2 {
                let other = sneak.transact();
                other.set(&tuple!["score", format!("b{attempt}")], 10)?;
                other.commit()?;
            }
            tx.set(&tuple!["total"], sum)?;
            Ok(sum)
        })
        .unwrap();

        // Two conflicted attempts, then a clean read of 1 + 10 + 10.
        assert_eq!(tries.load(Ordering::SeqCst), 3);
        assert_eq!(total, 21);
        assert_eq!(client.get(&tuple!["total"]).unwrap(), Some(21));
    }

    #[test]
    fn non_conflict_errors_surface_immediately() {
        let client = client();
        let tries = AtomicUsize::new(0);
        let result: Result<()> = transactionally(&client, |_tx| {
            tries.fetch_add(1, Ordering::SeqCst);
            Err(TupleDbError::storage("backend fell over"))
        });
        assert!(matches!(result, Err(TupleDbError::Storage { .. })));
        assert_eq!(tries.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn conflict_budget_is_finite() {
        let client = client();
        let sneak = client.clone();
        let tries = AtomicUsize::new(0);
        let result: Result<()> = transactionally_with_attempts(&client, 3, |tx| {
            tries.fetch_add(1, Ordering::SeqCst);
            let _ = tx.scan(&ScanArgs::new().prefix(tuple!["hot"]))?;
            let other = sneak.transact();
            other.set(&tuple!["hot", "key"], 1)?;
            other.commit()?;
            tx.set(&tuple!["out"], 1)?;
            Ok(())
        });
        assert!(result.unwrap_err().is_conflict());
        assert_eq!(tries.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn composes_with_existing_transaction() {
        fn bump<S, D>(db: &D) -> Result<i64>
        where
            S: TupleStorage<Value = i64>,
            D: Transactable<S>,
        {
            db.with_tx(|tx| {
                let next = tx.get(&tuple!["counter"])?.unwrap_or(0) + 1;
                tx.set(&tuple!["counter"], next)?;
                Ok(next)
            })
        }

        let client = client();
        // Standalone: wraps and commits.
        assert_eq!(bump(&client).unwrap(), 1);
        assert_eq!(client.get(&tuple!["counter"]).unwrap(), Some(1));

        // Composed: joins the outer transaction, which stays uncommitted.
        let tx = client.transact();
        assert_eq!(bump(&tx).unwrap(), 2);
        assert_eq!(client.get(&tuple!["counter"]).unwrap(), Some(1));
        tx.commit().unwrap();
        assert_eq!(client.get(&tuple!["counter"]).unwrap(), Some(2));
    }
}

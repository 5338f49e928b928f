//! Cooperative-suspension flavor of the engine and client.
//!
//! The async family has the same semantics as the sync one; the engine
//! surface becomes a trait so that an out-of-process adapter (any
//! request/response channel) can stand in for a local engine. The one
//! caveat for remote adapters is subscriptions: they need a push-capable
//! transport, because plain request/response cannot deliver emits.
//!
//! [`LocalAsyncDatabase`] is the thin local façade: it lifts a sync
//! [`TupleDatabase`] into the async trait by calling it directly. Within a
//! transaction, `set` and `remove` stay synchronous (they only touch the
//! local buffer) while every operation that reaches the engine suspends.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use tupledb_error::Result;
use tupledb_storage::TupleStorage;
use tupledb_types::{subspace, KeyValuePair, ScanArgs, Tuple, Writes};

use crate::client::point_result;
use crate::concurrency::TxId;
use crate::database::{Subscription, TupleDatabase};
use crate::reactivity::Callback;
use crate::retry::DEFAULT_ATTEMPTS;
use crate::transaction::{overlay_scan, TxShared};

/// The engine surface, in cooperative-suspension form.
#[async_trait]
pub trait AsyncTupleDatabase: Send + Sync {
    type Value: Clone + Send + Sync + 'static;

    async fn scan(
        &self,
        args: ScanArgs,
        tx: Option<TxId>,
    ) -> Result<Vec<KeyValuePair<Self::Value>>>;

    async fn commit(&self, writes: Writes<Self::Value>, tx: Option<TxId>) -> Result<()>;

    async fn cancel(&self, tx: TxId) -> Result<()>;

    async fn subscribe(
        &self,
        args: ScanArgs,
        callback: Callback<Self::Value>,
    ) -> Result<Subscription>;

    async fn close(&self) -> Result<()>;
}

/// A sync engine lifted into the async surface.
pub struct LocalAsyncDatabase<S: TupleStorage> {
    db: TupleDatabase<S>,
}

impl<S: TupleStorage> LocalAsyncDatabase<S> {
    pub fn new(db: TupleDatabase<S>) -> Self {
        Self { db }
    }
}

impl<S: TupleStorage> From<TupleDatabase<S>> for LocalAsyncDatabase<S> {
    fn from(db: TupleDatabase<S>) -> Self {
        Self::new(db)
    }
}

#[async_trait]
impl<S> AsyncTupleDatabase for LocalAsyncDatabase<S>
where
    S: TupleStorage + Send + 'static,
{
    type Value = S::Value;

    async fn scan(&self, args: ScanArgs, tx: Option<TxId>) -> Result<Vec<KeyValuePair<S::Value>>> {
        self.db.scan(&args, tx)
    }

    async fn commit(&self, writes: Writes<S::Value>, tx: Option<TxId>) -> Result<()> {
        self.db.commit(writes, tx)
    }

    async fn cancel(&self, tx: TxId) -> Result<()> {
        self.db.cancel(tx)
    }

    async fn subscribe(
        &self,
        args: ScanArgs,
        callback: Callback<S::Value>,
    ) -> Result<Subscription> {
        self.db.subscribe(&args, callback)
    }

    async fn close(&self) -> Result<()> {
        self.db.close()
    }
}

/// Async counterpart of [`crate::client::TupleClient`].
pub struct AsyncTupleClient<D: AsyncTupleDatabase> {
    api: Arc<D>,
    prefix: Tuple,
}

impl<D: AsyncTupleDatabase> Clone for AsyncTupleClient<D> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            prefix: self.prefix.clone(),
        }
    }
}

impl<D: AsyncTupleDatabase> AsyncTupleClient<D> {
    pub fn new(api: D) -> Self {
        Self {
            api: Arc::new(api),
            prefix: Tuple::new(),
        }
    }

    #[must_use]
    pub fn subspace(&self, prefix: &Tuple) -> Self {
        Self {
            api: Arc::clone(&self.api),
            prefix: self.prefix.concat(prefix),
        }
    }

    pub async fn scan(&self, args: &ScanArgs) -> Result<Vec<KeyValuePair<D::Value>>> {
        let full = subspace::prepend_prefix_to_scan_args(&self.prefix, args);
        let rows = self.api.scan(full, None).await?;
        Ok(subspace::remove_prefix_from_pairs(&self.prefix, rows))
    }

    pub async fn get(&self, key: &Tuple) -> Result<Option<D::Value>> {
        let rows = self
            .scan(&ScanArgs::new().gte(key.clone()).lte(key.clone()))
            .await?;
        point_result(rows)
    }

    pub async fn exists(&self, key: &Tuple) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    pub async fn subscribe(
        &self,
        args: &ScanArgs,
        callback: impl Fn(&Writes<D::Value>) + Send + Sync + 'static,
    ) -> Result<Subscription> {
        let full = subspace::prepend_prefix_to_scan_args(&self.prefix, args);
        let prefix = self.prefix.clone();
        let scoped: Callback<D::Value> = Arc::new(move |writes: &Writes<D::Value>| {
            let stripped = subspace::remove_prefix_from_writes(&prefix, writes.clone());
            callback(&stripped);
        });
        self.api.subscribe(full, scoped).await
    }

    pub async fn commit(&self, writes: Writes<D::Value>) -> Result<()> {
        self.api
            .commit(
                subspace::prepend_prefix_to_writes(&self.prefix, writes),
                None,
            )
            .await
    }

    /// Abandon a transaction by id, releasing its concurrency-log entries.
    /// Normally reached through [`AsyncTransaction::cancel`].
    pub async fn cancel(&self, tx: TxId) -> Result<()> {
        self.api.cancel(tx).await
    }

    #[must_use]
    pub fn transact(&self) -> AsyncTransaction<D> {
        AsyncTransaction {
            api: Arc::clone(&self.api),
            prefix: self.prefix.clone(),
            shared: Arc::new(TxShared::new()),
        }
    }

    pub async fn close(&self) -> Result<()> {
        self.api.close().await
    }
}

/// Async counterpart of [`crate::transaction::Transaction`].
///
/// `set`/`remove` are synchronous, since they never leave the local
/// buffer; everything that reaches the engine suspends. Clones share the
/// buffer, id and fate, exactly like sync subspace views.
pub struct AsyncTransaction<D: AsyncTupleDatabase> {
    api: Arc<D>,
    prefix: Tuple,
    shared: Arc<TxShared<D::Value>>,
}

impl<D: AsyncTupleDatabase> Clone for AsyncTransaction<D> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            prefix: self.prefix.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<D: AsyncTupleDatabase> fmt::Debug for AsyncTransaction<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncTransaction")
            .field("id", &self.shared.id())
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl<D: AsyncTupleDatabase> AsyncTransaction<D> {
    #[must_use]
    pub fn id(&self) -> TxId {
        self.shared.id()
    }

    #[must_use]
    pub fn subspace(&self, prefix: &Tuple) -> Self {
        Self {
            api: Arc::clone(&self.api),
            prefix: self.prefix.concat(prefix),
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn set(&self, key: &Tuple, value: D::Value) -> Result<()> {
        self.shared
            .buffer_set(subspace::prepend_prefix(&self.prefix, key), value)
    }

    pub fn remove(&self, key: &Tuple) -> Result<()> {
        self.shared
            .buffer_remove(subspace::prepend_prefix(&self.prefix, key))
    }

    pub async fn scan(&self, args: &ScanArgs) -> Result<Vec<KeyValuePair<D::Value>>> {
        let full = subspace::prepend_prefix_to_scan_args(&self.prefix, args);
        let bounds = full.bounds();
        let rows = self.api.scan(full, Some(self.shared.id())).await?;
        let rows = self.shared.with_writes(|writes| {
            overlay_scan(rows, writes, &bounds, args.reverse, args.limit)
        })?;
        Ok(subspace::remove_prefix_from_pairs(&self.prefix, rows))
    }

    pub async fn get(&self, key: &Tuple) -> Result<Option<D::Value>> {
        let full_key = subspace::prepend_prefix(&self.prefix, key);
        match self.shared.buffered(&full_key)? {
            Some(buffered) => Ok(buffered),
            None => {
                let rows = self
                    .api
                    .scan(
                        ScanArgs::new().gte(full_key.clone()).lte(full_key),
                        Some(self.shared.id()),
                    )
                    .await?;
                point_result(rows)
            }
        }
    }

    pub async fn exists(&self, key: &Tuple) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    pub async fn commit(&self) -> Result<()> {
        let writes = self.shared.take_writes_for_commit()?;
        self.api.commit(writes, Some(self.shared.id())).await?;
        self.shared.mark_committed();
        Ok(())
    }

    pub async fn cancel(&self) -> Result<()> {
        self.shared.mark_canceled()?;
        self.api.cancel(self.shared.id()).await
    }
}

/// Run `f` in an async transaction, retrying up to [`DEFAULT_ATTEMPTS`]
/// times on read-write conflicts.
///
/// `f` receives an owned transaction handle (a clone sharing the real
/// buffer), so the closure can move it into its future freely.
pub async fn transactionally_async<D, T, F, Fut>(client: &AsyncTupleClient<D>, f: F) -> Result<T>
where
    D: AsyncTupleDatabase,
    F: Fn(AsyncTransaction<D>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    transactionally_async_with_attempts(client, DEFAULT_ATTEMPTS, f).await
}

/// [`transactionally_async`] with an explicit attempt budget.
pub async fn transactionally_async_with_attempts<D, T, F, Fut>(
    client: &AsyncTupleClient<D>,
    attempts: usize,
    f: F,
) -> Result<T>
where
    D: AsyncTupleDatabase,
    F: Fn(AsyncTransaction<D>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let tx = client.transact();
        let err = match f(tx.clone()).await {
            Ok(value) => match tx.commit().await {
                Ok(()) => return Ok(value),
                Err(err) => err,
            },
            Err(err) => err,
        };
        let _ = tx.cancel().await;
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
    use std::sync::Mutex as StdMutex;

    use tupledb_storage::MemoryStorage;
    use tupledb_types::tuple;

    use super::*;

    fn client() -> AsyncTupleClient<LocalAsyncDatabase<MemoryStorage<i64>>> {
        AsyncTupleClient::new(LocalAsyncDatabase::new(TupleDatabase::new(
            MemoryStorage::new(),
        )))
    }

    #[tokio::test]
    async fn read_your_writes() {
        let client = client();
        let tx = client.transact();
        tx.set(&tuple!["a"], 1).unwrap();
        assert_eq!(tx.get(&tuple!["a"]).await.unwrap(), Some(1));
        assert_eq!(client.get(&tuple!["a"]).await.unwrap(), None);

        tx.commit().await.unwrap();
        assert_eq!(client.get(&tuple!["a"]).await.unwrap(), Some(1));
        assert!(tx.commit().await.is_err());
    }

    #[tokio::test]
    async fn subscriptions_fire_through_the_async_surface() {
        let client = client();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = client
            .subscribe(&ScanArgs::new().prefix(tuple!["score"]), move |writes| {
                sink.lock().unwrap().push(writes.clone());
            })
            .await
            .unwrap();

        let mut writes = Writes::new();
        writes.set(tuple!["score", "chet"], 2);
        client.commit(writes).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].sets()[0].key, tuple!["score", "chet"]);
    }

    #[tokio::test]
    async fn conflicts_retry_asynchronously() {
        let client = client();
        let tries = AtomicUsize::new(0);
        let sneak = client.clone();

        let sum = transactionally_async(&client, |tx| {
            let sneak = sneak.clone();
            let tries = &tries;
            async move {
                let rows = tx.scan(&ScanArgs::new().prefix(tuple!["score"])).await?;
                let sum: i64 = rows.iter().map(|p| p.value).sum();
                let attempt = tries.fetch_add(1, Ordering::SeqCst);
                if attempt == 0 {
                    let other = sneak.transact();
                    other.set(&tuple!["score", "racer"], 9)?;
                    other.commit().await?;
                }
                tx.set(&tuple!["sum"], sum)?;
                Ok(sum)
            }
        })
        .await
        .unwrap();

        assert_eq!(tries.load(Ordering::SeqCst), 2);
        assert_eq!(sum, 9);
        assert_eq!(client.get(&tuple!["sum"]).await.unwrap(), Some(9));
    }

    #[tokio::test]
    async fn subspace_views_compose() {
        let client = client();
        let g1 = client.subspace(&tuple!["game", "g1"]);
        let tx = g1.transact();
        tx.set(&tuple!["total"], 3).unwrap();
        tx.commit().await.unwrap();

        assert_eq!(
            client.get(&tuple!["game", "g1", "total"]).await.unwrap(),
            Some(3)
        );
    }
}

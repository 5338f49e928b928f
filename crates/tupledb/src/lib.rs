//! An ordered tuple-key/value database engine.
//!
//! Keys are tuples of typed values with a total order across types, so
//! composite keys sort the way an index should: element-wise, not as
//! joined strings. On top of that order the engine layers range scans,
//! reactive subscriptions that fire when a committed batch intersects
//! their bounds, and optimistic transactions that buffer writes locally
//! and detect read-write conflicts at commit time. The data model follows
//! FoundationDB's tuple/subspace design.
//!
//! # Quick start
//!
//! ```
//! use tupledb::{tuple, MemoryStorage, ScanArgs, TupleClient, TupleDatabase};
//!
//! fn main() -> tupledb::Result<()> {
//!     let client = TupleClient::new(TupleDatabase::new(MemoryStorage::<i64>::new()));
//!
//!     let tx = client.transact();
//!     tx.set(&tuple!["score", "chet"], 2)?;
//!     tx.set(&tuple!["score", "zoe"], 5)?;
//!     tx.commit()?;
//!
//!     let scores = client.scan(&ScanArgs::new().prefix(tuple!["score"]))?;
//!     assert_eq!(scores.len(), 2);
//!     assert_eq!(client.get(&tuple!["score", "zoe"])?, Some(5));
//!     Ok(())
//! }
//! ```
//!
//! # Layering
//!
//! - [`tupledb_types`]: values, tuples, the comparator, the
//!   order-preserving codec, scan bounds and write batches.
//! - [`tupledb_storage`]: the sorted-map backend contract plus in-memory
//!   and SQLite backends.
//! - [`tupledb_core`]: the engine (storage + reactivity + concurrency
//!   log), clients, transactions and the retry wrapper, in sync and async
//!   flavors.
//!
//! This crate re-exports the public surface of all three.

pub use tupledb_core::{
    transactionally, transactionally_async, transactionally_async_with_attempts,
    transactionally_with_attempts, AsyncTransaction, AsyncTupleClient, AsyncTupleDatabase,
    Callback, LocalAsyncDatabase, Subscription, Transactable, Transaction, TupleClient,
    TupleDatabase, TxId, DEFAULT_ATTEMPTS,
};
pub use tupledb_error::{DecodeError, Result, TerminalState, TupleDbError};
pub use tupledb_storage::{MemoryStorage, SqliteStorage, StorageScanArgs, TupleStorage};
pub use tupledb_types::{
    decode_tuple, encode_tuple, tuple, Bound, Bounds, KeyValuePair, ScanArgs, SearchResult, Tuple,
    Value, Writes,
};

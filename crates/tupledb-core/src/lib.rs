//! Engine and client layers of tupledb: the reactivity tracker, the
//! optimistic concurrency log, the [`TupleDatabase`] engine that binds
//! them to a storage backend, and the sync/async client and transaction
//! families on top.

pub mod async_api;
pub mod client;
pub mod concurrency;
pub mod database;
pub mod reactivity;
pub mod retry;
pub mod transaction;

pub use async_api::{
    transactionally_async, transactionally_async_with_attempts, AsyncTransaction,
    AsyncTupleClient, AsyncTupleDatabase, LocalAsyncDatabase,
};
pub use client::TupleClient;
pub use concurrency::TxId;
pub use database::{Subscription, TupleDatabase};
pub use reactivity::Callback;
pub use retry::{
    transactionally, transactionally_with_attempts, Transactable, DEFAULT_ATTEMPTS,
};
pub use transaction::Transaction;

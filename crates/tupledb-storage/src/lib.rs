//! Storage adapter contract and the backends that implement it.
//!
//! A backend is nothing more than a sorted map: it scans a normalized
//! range in key order and applies write batches atomically. Prefix
//! expansion, subspaces, conflict detection and reactivity all live above
//! this seam, so a backend never sees anything but bounds and batches.

pub mod memory;
pub mod sqlite;

use tupledb_error::Result;
use tupledb_types::{Bounds, KeyValuePair, Writes};

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

/// Arguments a backend receives for a scan. `prefix` is expanded into the
/// bounds upstream, so only the normalized range arrives here.
#[derive(Debug, Clone, Default)]
pub struct StorageScanArgs {
    pub bounds: Bounds,
    /// Descending key order. `limit` applies after the reversal.
    pub reverse: bool,
    pub limit: Option<usize>,
}

/// A sorted-map storage backend.
///
/// The engine serializes all calls behind its own lock, so `commit` is
/// atomic with respect to `scan` as long as the backend applies a batch
/// all-or-nothing. Within one batch a key appears at most once across the
/// set and remove sides (the [`Writes`] type enforces it), so application
/// order between the two sides is immaterial.
pub trait TupleStorage {
    type Value: Clone + Send + Sync + 'static;

    /// Scan pairs within the bounds, ascending by key unless `reverse`,
    /// truncated to `limit`.
    fn scan(&self, args: &StorageScanArgs) -> Result<Vec<KeyValuePair<Self::Value>>>;

    /// Apply a write batch atomically.
    fn commit(&mut self, writes: Writes<Self::Value>) -> Result<()>;

    /// Release resources. Further calls fail with
    /// [`tupledb_error::TupleDbError::DatabaseClosed`].
    fn close(&mut self) -> Result<()>;
}

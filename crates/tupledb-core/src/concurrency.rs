//! Optimistic concurrency control over range-read sets.
//!
//! The log is a time-ordered record of what each live transaction read
//! (as bounds) and wrote (as keys). Commit replays the log: a write by
//! another transaction that lands inside a range this transaction read
//! *earlier* invalidates the read, and the commit is rejected. Writes
//! against ranges nobody read commit freely; the price of the optimism is
//! paid only at commit time.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;
use tupledb_error::{Result, TupleDbError};
use tupledb_types::{Bounds, Tuple};

static NEXT_TX_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of a transaction, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxId(u64);

impl TxId {
    /// Allocate a fresh id.
    #[must_use]
    pub fn allocate() -> Self {
        Self(NEXT_TX_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
enum LogEntry {
    Read { tx: TxId, bounds: Bounds },
    Write { tx: TxId, key: Tuple },
}

impl LogEntry {
    const fn tx(&self) -> TxId {
        match self {
            Self::Read { tx, .. } | Self::Write { tx, .. } => *tx,
        }
    }
}

/// Append-only read/write record, replayed at commit time.
#[derive(Debug, Default)]
pub(crate) struct ConcurrencyLog {
    entries: Vec<LogEntry>,
}

impl ConcurrencyLog {
    /// Record a range read by `tx`.
    pub fn read(&mut self, tx: TxId, bounds: Bounds) {
        self.entries.push(LogEntry::Read { tx, bounds });
    }

    /// Record a key write by `tx`.
    pub fn write(&mut self, tx: TxId, key: Tuple) {
        self.entries.push(LogEntry::Write { tx, key });
    }

    /// Validate `tx` against the log and retire its reads.
    ///
    /// A conflict exists when some other transaction's write appears
    /// *after* one of `tx`'s reads (in log order) and its key lies inside
    /// that read's bounds. On success the transaction's read entries are
    /// dropped; its write entries stay behind until no earlier live read
    /// could still be invalidated by them.
    pub fn commit(&mut self, tx: TxId) -> Result<()> {
        let mut reads: Vec<&Bounds> = Vec::new();
        for entry in &self.entries {
            match entry {
                LogEntry::Read { tx: reader, bounds } if *reader == tx => reads.push(bounds),
                LogEntry::Write { tx: writer, key } if *writer != tx => {
                    if reads.iter().any(|bounds| bounds.contains(key)) {
                        debug!(%tx, %writer, %key, "read-write conflict");
                        return Err(TupleDbError::ReadWriteConflict {
                            tx: tx.get(),
                            writer: writer.get(),
                        });
                    }
                }
                _ => {}
            }
        }
        self.entries
            .retain(|entry| !matches!(entry, LogEntry::Read { tx: reader, .. } if *reader == tx));
        self.vacuum();
        Ok(())
    }

    /// Drop everything `tx` recorded.
    pub fn cancel(&mut self, tx: TxId) {
        self.entries.retain(|entry| entry.tx() != tx);
        self.vacuum();
    }

    /// Garbage-collect writes that predate every remaining read. A write
    /// can only invalidate a read that came before it, so once the oldest
    /// live read is younger than a write, that write is dead weight.
    fn vacuum(&mut self) {
        let first_read = self
            .entries
            .iter()
            .position(|entry| matches!(entry, LogEntry::Read { .. }));
        match first_read {
            None => self.entries.clear(),
            Some(idx) => {
                self.entries.drain(..idx);
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

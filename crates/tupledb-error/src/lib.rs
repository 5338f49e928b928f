use thiserror::Error;

/// How a transaction reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalState {
    Committed,
    Canceled,
}

impl std::fmt::Display for TerminalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Committed => f.write_str("committed"),
            Self::Canceled => f.write_str("canceled"),
        }
    }
}

/// Errors produced while decoding an order-preserving encoded tuple.
///
/// Every variant carries the byte offset where decoding failed, so a
/// corrupt key in a storage backend can be located exactly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Input ended in the middle of an element.
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEnd { offset: usize },

    /// A byte that is not a known element tag where a tag was expected.
    #[error("unknown element tag {tag:#04x} at offset {offset}")]
    UnknownTag { tag: u8, offset: usize },

    /// A string element contained invalid UTF-8.
    #[error("invalid UTF-8 in string element at offset {offset}")]
    InvalidUtf8 { offset: usize },

    /// A boolean payload byte was neither 0 nor 1.
    #[error("invalid boolean payload {byte:#04x} at offset {offset}")]
    InvalidBool { byte: u8, offset: usize },

    /// An object entry did not begin with a string key.
    #[error("object entry key is not a string at offset {offset}")]
    NonStringKey { offset: usize },
}

/// Primary error type for tupledb operations.
///
/// Only [`TupleDbError::ReadWriteConflict`] is transient: the retry wrapper
/// catches it and re-runs the transaction. Everything else surfaces to the
/// caller unchanged.
#[derive(Error, Debug)]
pub enum TupleDbError {
    /// A commit was rejected because another transaction wrote into a
    /// range this transaction had already read.
    #[error("read-write conflict: transaction {tx} read a range later written by transaction {writer}")]
    ReadWriteConflict { tx: u64, writer: u64 },

    /// An operation was attempted on a transaction that already reached a
    /// terminal state.
    #[error("transaction {tx} is already {state}")]
    TransactionClosed { tx: u64, state: TerminalState },

    /// `get()` observed more than one pair in a single-tuple range. This
    /// indicates a bug in writer code, not in the reader.
    #[error("expected at most one result for a single-tuple range, got {count}")]
    GetExpectedSingle { count: usize },

    /// A stored key failed to decode.
    #[error("malformed encoded tuple: {0}")]
    Decode(#[from] DecodeError),

    /// An error propagated from a storage backend. Never retried.
    #[error("storage error: {detail}")]
    Storage { detail: String },

    /// The database (or a storage backend) was closed and cannot serve
    /// further operations.
    #[error("database is closed")]
    DatabaseClosed,
}

impl TupleDbError {
    /// Create a storage error from any displayable backend error.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage {
            detail: err.to_string(),
        }
    }

    /// Whether this error is a read-write conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::ReadWriteConflict { .. })
    }

    /// Whether retrying the failed transaction may succeed.
    ///
    /// Conflicts are the only transient error kind; a transaction that hits
    /// one can be re-run from scratch against the new database state.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        self.is_conflict()
    }
}

/// Result type alias using `TupleDbError`.
pub type Result<T> = std::result::Result<T, TupleDbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_display() {
        let err = TupleDbError::ReadWriteConflict { tx: 3, writer: 7 };
        assert_eq!(
            err.to_string(),
            "read-write conflict: transaction 3 read a range later written by transaction 7"
        );
    }

    #[test]
    fn transaction_closed_display() {
        let err = TupleDbError::TransactionClosed {
            tx: 9,
            state: TerminalState::Committed,
        };
        assert_eq!(err.to_string(), "transaction 9 is already committed");

        let err = TupleDbError::TransactionClosed {
            tx: 9,
            state: TerminalState::Canceled,
        };
        assert_eq!(err.to_string(), "transaction 9 is already canceled");
    }

    #[test]
    fn decode_error_converts() {
        let err: TupleDbError = DecodeError::UnknownTag {
            tag: 0x42,
            offset: 5,
        }
        .into();
        assert!(matches!(err, TupleDbError::Decode(_)));
        assert_eq!(
            err.to_string(),
            "malformed encoded tuple: unknown element tag 0x42 at offset 5"
        );
    }

    #[test]
    fn only_conflicts_are_transient() {
        assert!(TupleDbError::ReadWriteConflict { tx: 1, writer: 2 }.is_transient());
        assert!(!TupleDbError::GetExpectedSingle { count: 2 }.is_transient());
        assert!(!TupleDbError::storage("disk on fire").is_transient());
        assert!(!TupleDbError::DatabaseClosed.is_transient());
        assert!(
            !TupleDbError::TransactionClosed {
                tx: 1,
                state: TerminalState::Canceled
            }
            .is_transient()
        );
    }

    #[test]
    fn storage_constructor() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "short write");
        let err = TupleDbError::storage(io);
        assert_eq!(err.to_string(), "storage error: short write");
    }
}

//! SQLite backend: a relational engine used purely as a sorted byte map.
//!
//! Keys are stored as order-preserving encoded BLOBs, so SQLite's memcmp
//! collation over `key` *is* the tuple order and range scans translate
//! directly into `WHERE key > ?` clauses. Values go through `serde_json`
//! into a TEXT column; the backend is generic over any serde-able value
//! type.

use std::marker::PhantomData;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use tupledb_error::{Result, TupleDbError};
use tupledb_types::{codec, Bound, KeyValuePair, Writes};

use crate::{StorageScanArgs, TupleStorage};

/// A SQLite file (or in-memory database) exposed as tuple storage.
pub struct SqliteStorage<V> {
    conn: Option<rusqlite::Connection>,
    _value: PhantomData<fn() -> V>,
}

impl<V> SqliteStorage<V> {
    /// Open (creating if needed) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = rusqlite::Connection::open(path.as_ref()).map_err(TupleDbError::storage)?;
        Self::init(conn)
    }

    /// Open a private in-memory database. Handy for tests and scratch use.
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory().map_err(TupleDbError::storage)?;
        Self::init(conn)
    }

    fn init(conn: rusqlite::Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS tuples (
                key   BLOB PRIMARY KEY,
                value TEXT NOT NULL
            ) WITHOUT ROWID;",
        )
        .map_err(TupleDbError::storage)?;
        Ok(Self {
            conn: Some(conn),
            _value: PhantomData,
        })
    }

    fn conn(&self) -> Result<&rusqlite::Connection> {
        self.conn.as_ref().ok_or(TupleDbError::DatabaseClosed)
    }

    fn conn_mut(&mut self) -> Result<&mut rusqlite::Connection> {
        self.conn.as_mut().ok_or(TupleDbError::DatabaseClosed)
    }
}

fn push_bound(
    clauses: &mut Vec<&'static str>,
    params: &mut Vec<rusqlite::types::Value>,
    bound: &Bound,
    lower: bool,
) {
    clauses.push(match (lower, bound.inclusive) {
        (true, true) => "key >= ?",
        (true, false) => "key > ?",
        (false, true) => "key <= ?",
        (false, false) => "key < ?",
    });
    params.push(rusqlite::types::Value::Blob(codec::encode_tuple(&bound.key)));
}

impl<V: Clone + Send + Sync + Serialize + DeserializeOwned + 'static> TupleStorage
    for SqliteStorage<V>
{
    type Value = V;

    fn scan(&self, args: &StorageScanArgs) -> Result<Vec<KeyValuePair<V>>> {
        let conn = self.conn()?;

        let mut clauses = Vec::new();
        let mut params = Vec::new();
        if let Some(lower) = &args.bounds.lower {
            push_bound(&mut clauses, &mut params, lower, true);
        }
        if let Some(upper) = &args.bounds.upper {
            push_bound(&mut clauses, &mut params, upper, false);
        }

        let mut sql = String::from("SELECT key, value FROM tuples");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(if args.reverse {
            " ORDER BY key DESC"
        } else {
            " ORDER BY key ASC"
        });
        sql.push_str(" LIMIT ?");
        let limit = args.limit.map_or(-1_i64, |n| {
            i64::try_from(n).unwrap_or(i64::MAX)
        });
        params.push(rusqlite::types::Value::Integer(limit));

        let mut stmt = conn.prepare_cached(&sql).map_err(TupleDbError::storage)?;
        let mut rows = stmt
            .query(rusqlite::params_from_iter(params))
            .map_err(TupleDbError::storage)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(TupleDbError::storage)? {
            let key_bytes: Vec<u8> = row.get(0).map_err(TupleDbError::storage)?;
            let value_json: String = row.get(1).map_err(TupleDbError::storage)?;
            let key = codec::decode_tuple(&key_bytes)?;
            let value = serde_json::from_str(&value_json).map_err(TupleDbError::storage)?;
            out.push(KeyValuePair::new(key, value));
        }
        Ok(out)
    }

    fn commit(&mut self, writes: Writes<V>) -> Result<()> {
        let conn = self.conn_mut()?;
        let tx = conn.transaction().map_err(TupleDbError::storage)?;
        let (set, remove) = writes.into_parts();
        for key in &remove {
            tx.execute(
                "DELETE FROM tuples WHERE key = ?",
                [codec::encode_tuple(key)],
            )
            .map_err(TupleDbError::storage)?;
        }
        for pair in &set {
            let value_json = serde_json::to_string(&pair.value).map_err(TupleDbError::storage)?;
            tx.execute(
                "INSERT OR REPLACE INTO tuples (key, value) VALUES (?, ?)",
                rusqlite::params![codec::encode_tuple(&pair.key), value_json],
            )
            .map_err(TupleDbError::storage)?;
        }
        tx.commit().map_err(TupleDbError::storage)?;
        debug!(sets = set.len(), removes = remove.len(), "sqlite commit");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, err)| TupleDbError::storage(err))?;
        }
        Ok(())
    }
}

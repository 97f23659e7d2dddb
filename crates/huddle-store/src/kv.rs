//! Transactional key-value store on SQLite.
//!
//! Records live in named partitions. Every read happens inside a [`Store::view`]
//! transaction and every write inside a [`Store::update`] transaction, which
//! commits only when its closure returns `Ok`.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{info, warn};

use crate::StoreError;

/// A named partition of the key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Recurring question definitions, keyed by decimal id.
    Questions,
    /// Prompt rounds, keyed by `{channel}:{ts}`.
    Rounds,
    /// Tenants, keyed by team id.
    Teams,
}

impl Partition {
    /// Every partition the store knows about.
    pub const ALL: [Partition; 3] = [Partition::Questions, Partition::Rounds, Partition::Teams];

    /// Storage-level partition name.
    pub fn name(self) -> &'static str {
        match self {
            Partition::Questions => "questions",
            Partition::Rounds => "messages",
            Partition::Teams => "teams",
        }
    }
}

/// SQLite-backed partitioned key-value store.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create the store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        let store = Self::init(conn)?;
        info!(path = %path.display(), "store opened");
        Ok(store)
    }

    /// Open a store that lives only as long as this handle.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv (
                partition TEXT NOT NULL,
                key TEXT NOT NULL,
                value BLOB NOT NULL,
                PRIMARY KEY (partition, key)
            );

            CREATE TABLE IF NOT EXISTS sequences (
                partition TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );
            ",
        )?;

        {
            let mut stmt =
                conn.prepare("INSERT OR IGNORE INTO sequences (partition, value) VALUES (?1, 0)")?;
            for partition in Partition::ALL {
                stmt.execute(params![partition.name()])?;
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a read-only transaction.
    pub fn view<T>(
        &self,
        f: impl FnOnce(&Tx<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let out = f(&Tx {
            conn: &tx,
            writable: false,
        })?;
        tx.rollback()?;
        Ok(out)
    }

    /// Run a read-write transaction. Nothing is committed if `f` fails.
    pub fn update<T>(
        &self,
        f: impl FnOnce(&Tx<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&Tx {
            conn: &tx,
            writable: true,
        })?;
        tx.commit()?;
        Ok(out)
    }
}

/// A handle to an open transaction.
pub struct Tx<'a> {
    conn: &'a Connection,
    writable: bool,
}

impl Tx<'_> {
    fn ensure_writable(&self) -> Result<(), StoreError> {
        if self.writable {
            Ok(())
        } else {
            Err(StoreError::ReadOnly)
        }
    }

    /// Get the raw value stored under `key`.
    pub fn get(&self, partition: Partition, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv WHERE partition = ?1 AND key = ?2",
                params![partition.name(), key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Insert or replace the value stored under `key`.
    pub fn put(&self, partition: Partition, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.ensure_writable()?;
        self.conn.execute(
            "INSERT INTO kv (partition, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(partition, key) DO UPDATE SET value = excluded.value",
            params![partition.name(), key, value],
        )?;
        Ok(())
    }

    /// Delete `key`. Returns whether anything was removed.
    pub fn delete(&self, partition: Partition, key: &str) -> Result<bool, StoreError> {
        self.ensure_writable()?;
        let removed = self.conn.execute(
            "DELETE FROM kv WHERE partition = ?1 AND key = ?2",
            params![partition.name(), key],
        )?;
        Ok(removed > 0)
    }

    /// All entries of a partition, ordered by key.
    pub fn scan(&self, partition: Partition) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM kv WHERE partition = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![partition.name()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Advance and return the partition's sequence. Values are never reused.
    pub fn next_sequence(&self, partition: Partition) -> Result<u64, StoreError> {
        self.ensure_writable()?;
        let value: i64 = self.conn.query_row(
            "INSERT INTO sequences (partition, value) VALUES (?1, 1)
             ON CONFLICT(partition) DO UPDATE SET value = value + 1
             RETURNING value",
            params![partition.name()],
            |row| row.get(0),
        )?;
        Ok(value as u64)
    }

    /// Get and decode a JSON value.
    pub fn get_json<T: DeserializeOwned>(
        &self,
        partition: Partition,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        match self.get(partition, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Encode and store a JSON value.
    pub fn put_json<T: Serialize>(
        &self,
        partition: Partition,
        key: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value)?;
        self.put(partition, key, &bytes)
    }

    /// Decode every value of a partition, in key order.
    ///
    /// Values that fail to decode are logged and left out.
    pub fn scan_json<T: DeserializeOwned>(
        &self,
        partition: Partition,
    ) -> Result<Vec<(String, T)>, StoreError> {
        let mut out = Vec::new();
        for (key, bytes) in self.scan(partition)? {
            match serde_json::from_slice(&bytes) {
                Ok(value) => out.push((key, value)),
                Err(e) => {
                    warn!(partition = partition.name(), key = %key, error = %e, "skipping unreadable record");
                }
            }
        }
        Ok(out)
    }
}

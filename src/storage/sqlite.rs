//! SQLite Storage Backend with Connection Pooling
//!
//! Durable cache storage:
//! - Connection pooling via r2d2
//! - WAL mode for concurrent readers
//! - Capacity enforced inside a transaction on every write
//! - Version-tracked schema

use std::path::Path;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, params};

use super::backend::{EntryMeta, StorageBackend};
use crate::types::{LessonError, Result, ResultExt};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    key        TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    size       INTEGER NOT NULL,
    seq        INTEGER NOT NULL,
    written_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_entries_seq ON entries(seq);
"#;

/// Current schema version
const SCHEMA_VERSION: u32 = 1;

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,
    /// Timeout for acquiring a connection (seconds)
    pub connection_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 4,
            connection_timeout_secs: 30,
        }
    }
}

/// Pooled SQLite key-value store
pub struct SqliteBackend {
    pool: Pool<SqliteConnectionManager>,
    capacity: usize,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl SqliteBackend {
    /// Open (creating if needed) the cache database at `path`
    pub fn open<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self> {
        Self::open_with_config(path, capacity, PoolConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        capacity: usize,
        config: PoolConfig,
    ) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let manager =
            SqliteConnectionManager::file(path.as_ref()).with_init(Self::configure_connection);

        let pool = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(std::time::Duration::from_secs(
                config.connection_timeout_secs,
            ))
            .build(manager)
            .map_err(|e| {
                LessonError::Storage(format!("Failed to create connection pool: {}", e))
            })?;

        let backend = Self { pool, capacity };
        backend.initialize()?;
        Ok(backend)
    }

    /// Single-connection in-memory database
    pub fn open_in_memory(capacity: usize) -> Result<Self> {
        let pool = Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::memory())
            .map_err(|e| {
                LessonError::Storage(format!("Failed to create in-memory pool: {}", e))
            })?;

        let backend = Self { pool, capacity };
        backend.initialize()?;
        Ok(backend)
    }

    fn configure_connection(conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            PRAGMA wal_autocheckpoint = 1000;
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            LessonError::Storage(format!("Failed to acquire database connection: {}", e))
        })
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)
            .with_context("Failed to initialize cache schema")?;

        let current_version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);
        if current_version < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                .with_context("Failed to set schema version")?;
        }
        Ok(())
    }

    /// Run `f` inside a transaction; rolled back on error
    fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .with_context("Failed to start transaction")?;

        let value = f(&tx)?;
        tx.commit().with_context("Failed to commit transaction")?;
        Ok(value)
    }
}

impl StorageBackend for SqliteBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT value FROM entries WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .with_context_fn(|| format!("Failed to read cache entry '{}'", key))
    }

    fn put(&self, key: &str, value: &str, size: usize) -> Result<()> {
        let capacity = self.capacity;
        self.transaction(|tx| {
            let used_by_others: i64 = tx.query_row(
                "SELECT COALESCE(SUM(size), 0) FROM entries WHERE key != ?1",
                params![key],
                |row| row.get(0),
            )?;
            let used_by_others = used_by_others.max(0) as usize;

            if used_by_others + size > capacity {
                return Err(LessonError::QuotaExceeded {
                    requested: size,
                    available: capacity.saturating_sub(used_by_others),
                });
            }

            tx.execute(
                "INSERT INTO entries (key, value, size, seq, written_at)
                 VALUES (?1, ?2, ?3, (SELECT COALESCE(MAX(seq), 0) + 1 FROM entries), ?4)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     size = excluded.size,
                     seq = excluded.seq,
                     written_at = excluded.written_at",
                params![key, value, size as i64, chrono::Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn
            .execute("DELETE FROM entries WHERE key = ?1", params![key])
            .with_context_fn(|| format!("Failed to remove cache entry '{}'", key))?;
        Ok(removed > 0)
    }

    fn entries(&self) -> Result<Vec<EntryMeta>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT key, size, seq FROM entries ORDER BY seq ASC")
            .with_context("Failed to list cache entries")?;

        let rows = stmt
            .query_map([], |row| {
                Ok(EntryMeta {
                    key: row.get(0)?,
                    size: row.get::<_, i64>(1)?.max(0) as usize,
                    seq: row.get::<_, i64>(2)?.max(0) as u64,
                })
            })
            .with_context("Failed to list cache entries")?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .with_context("Failed to read cache entry row")
    }

    fn used_bytes(&self) -> Result<usize> {
        let conn = self.conn()?;
        let used: i64 = conn
            .query_row("SELECT COALESCE(SUM(size), 0) FROM entries", [], |row| {
                row.get(0)
            })
            .with_context("Failed to compute cache usage")?;
        Ok(used.max(0) as usize)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn clear(&self) -> Result<usize> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM entries", [])
            .with_context("Failed to clear cache")
    }
}

//! The durable on-disk cache store.

use crate::filter::PruneFilter;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use txreplay_core::{Error, Network};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS cache_entries (
    cache_key   TEXT PRIMARY KEY,
    value       BLOB NOT NULL,
    created_at  INTEGER NOT NULL,
    expires_at  INTEGER NOT NULL,
    network     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_cache_entries_network ON cache_entries(network);
CREATE INDEX IF NOT EXISTS idx_cache_entries_created_at ON cache_entries(created_at);
";

/// A durable, SQLite-backed key/value cache. Single-writer/multiple-reader
/// access is approximated here by serializing all access through one
/// mutex-guarded connection: simpler than a connection pool, and callers
/// already aren't meant to assume point-in-time consistency across reads.
pub struct Cache {
    conn: Mutex<Connection>,
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

fn map_sqlite(err: rusqlite::Error) -> Error {
    Error::config_error(format!("cache storage error: {err}"))
}

impl Cache {
    /// Opens (creating if needed) the cache database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::config_error(format!("failed to create cache directory: {e}"))
                })?;
            }
        }
        let conn = Connection::open(path).map_err(map_sqlite)?;
        conn.execute_batch(SCHEMA).map_err(map_sqlite)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory cache, for tests and offline work.
    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().map_err(map_sqlite)?;
        conn.execute_batch(SCHEMA).map_err(map_sqlite)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Reads a value. A row past its TTL is a miss, not an error.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        let conn = self.conn.lock();
        let now = now_unix();
        conn.query_row(
            "SELECT value FROM cache_entries WHERE cache_key = ?1 AND ?2 <= expires_at",
            params![key, now],
            |row| row.get(0),
        )
        .optional()
        .map_err(map_sqlite)
    }

    /// Upserts a value with the given TTL.
    pub fn put(&self, key: &str, value: &[u8], network: Network, ttl: Duration) -> Result<(), Error> {
        let conn = self.conn.lock();
        let now = now_unix();
        let expires_at = now + ttl.as_secs() as i64;
        conn.execute(
            "INSERT INTO cache_entries (cache_key, value, created_at, expires_at, network)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(cache_key) DO UPDATE SET
                value = excluded.value,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at,
                network = excluded.network",
            params![key, value, now, expires_at, network.as_str()],
        )
        .map_err(map_sqlite)?;
        Ok(())
    }

    /// Deletes one row outright, regardless of TTL.
    pub fn clear_key(&self, key: &str) -> Result<(), Error> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM cache_entries WHERE cache_key = ?1", params![key])
            .map_err(map_sqlite)?;
        Ok(())
    }

    /// Prunes rows matching `filter`. Rejects an empty filter. Pruning the
    /// same filter twice removes 0 rows the second time, i.e. it is
    /// idempotent.
    pub fn prune(&self, filter: PruneFilter) -> Result<u64, Error> {
        filter.validate()?;
        let conn = self.conn.lock();

        if filter.is_all() {
            let deleted = conn
                .execute("DELETE FROM cache_entries", [])
                .map_err(map_sqlite)?;
            return Ok(deleted as u64);
        }

        let mut clauses = Vec::new();
        let mut bound: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(secs) = filter.older_than_secs() {
            clauses.push(format!("created_at <= ?{}", bound.len() + 1));
            bound.push(Box::new(now_unix() - secs));
        }
        if let Some(network) = filter.network_name() {
            clauses.push(format!("network = ?{}", bound.len() + 1));
            bound.push(Box::new(network));
        }

        let sql = format!(
            "DELETE FROM cache_entries WHERE {}",
            clauses.join(" AND ")
        );
        let params: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|b| b.as_ref()).collect();
        let deleted = conn.execute(&sql, params.as_slice()).map_err(map_sqlite)?;
        Ok(deleted as u64)
    }

    /// Number of rows currently stored, live or expired (diagnostic use).
    pub fn len(&self) -> Result<u64, Error> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))
            .map_err(map_sqlite)
    }
}

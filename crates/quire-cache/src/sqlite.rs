//! `SQLite`-backed cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use quire_core::{CacheAdapter, CacheError, CachePayload};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::schema;

/// Cache stored in a `SQLite` table. Payloads are JSON text.
///
/// The connection sits behind a `parking_lot::Mutex`; all access is
/// synchronous.
pub struct SqliteCache {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
    ttl: Option<Duration>,
}

fn storage(context: &str) -> impl Fn(rusqlite::Error) -> CacheError + '_ {
    move |e| CacheError::Storage(format!("{context}: {e}"))
}

impl SqliteCache {
    /// Open or create the database at `path`.
    pub fn open(path: &Path, ttl: Option<Duration>) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CacheError::Io(format!("create dir: {e}")))?;
        }

        let conn = Connection::open(path).map_err(storage("open"))?;
        Self::prepare(&conn)?;

        info!(path = %path.display(), "cache database opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_owned(),
            ttl,
        })
    }

    /// Open an in-memory database.
    pub fn in_memory(ttl: Option<Duration>) -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory().map_err(storage("open"))?;
        Self::prepare(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
            ttl,
        })
    }

    fn prepare(conn: &Connection) -> Result<(), CacheError> {
        conn.execute_batch(schema::PRAGMAS)
            .map_err(storage("pragmas"))?;
        conn.execute_batch(schema::CREATE_TABLES)
            .map_err(storage("schema"))?;
        Ok(())
    }

    /// Database location, `:memory:` for in-memory caches.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete every expired row. Returns the number removed.
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let removed = self
            .conn
            .lock()
            .execute(
                "DELETE FROM cache_entries WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                params![now_millis()],
            )
            .map_err(storage("purge expired"))?;
        debug!(removed, "expired cache entries purged");
        Ok(removed)
    }
}

impl CacheAdapter for SqliteCache {
    fn get(&self, key: &str) -> Result<Option<CachePayload>, CacheError> {
        let conn = self.conn.lock();
        let row: Option<(String, Option<i64>)> = conn
            .query_row(
                "SELECT payload, expires_at FROM cache_entries WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(storage("get"))?;

        match row {
            Some((_, Some(expires_at))) if expires_at <= now_millis() => {
                let _removed = conn
                    .execute("DELETE FROM cache_entries WHERE key = ?1", params![key])
                    .map_err(storage("expire"))?;
                Ok(None)
            }
            Some((payload, _)) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, payload: &CachePayload) -> Result<(), CacheError> {
        let json = serde_json::to_string(payload)?;
        let expires_at = self
            .ttl
            .map(|ttl| now_millis().saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)));
        let _rows = self
            .conn
            .lock()
            .execute(
                "INSERT INTO cache_entries (key, payload, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET payload = excluded.payload, expires_at = excluded.expires_at",
                params![key, json, expires_at],
            )
            .map_err(storage("put"))?;
        Ok(())
    }

    fn purge(&self, key: &str) -> Result<bool, CacheError> {
        let removed = self
            .conn
            .lock()
            .execute("DELETE FROM cache_entries WHERE key = ?1", params![key])
            .map_err(storage("purge"))?;
        Ok(removed > 0)
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

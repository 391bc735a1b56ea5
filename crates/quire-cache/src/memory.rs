//! In-memory TTL cache.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use quire_core::{CacheAdapter, CacheError, CachePayload};

struct CacheEntry {
    payload: CachePayload,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Process-local cache. Entries expire after `ttl` when one is set.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Option<Duration>,
}

impl MemoryCache {
    /// Create a cache. `None` keeps entries until purged.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Remove expired entries.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.entries.lock().retain(|_, e| !e.is_expired(now));
    }
}

impl CacheAdapter for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<CachePayload>, CacheError> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        let expired = match entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => return Ok(None),
        };
        if expired {
            drop(entries.remove(key));
            return Ok(None);
        }
        Ok(entries.get(key).map(|e| e.payload.clone()))
    }

    fn put(&self, key: &str, payload: &CachePayload) -> Result<(), CacheError> {
        let entry = CacheEntry {
            payload: payload.clone(),
            expires_at: self.ttl.map(|ttl| Instant::now() + ttl),
        };
        drop(self.entries.lock().insert(key.to_owned(), entry));
        Ok(())
    }

    fn purge(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.lock().remove(key).is_some())
    }
}

//! Backend selection from settings.

use std::sync::Arc;

use quire_core::{CacheAdapter, CacheError};
use quire_settings::{CacheBackend, CacheSettings};
use tracing::debug;

use crate::memory::MemoryCache;
use crate::sqlite::SqliteCache;

/// Build the configured cache, `None` when caching is disabled.
pub fn open_backend(settings: &CacheSettings) -> Result<Option<Arc<dyn CacheAdapter>>, CacheError> {
    let ttl = settings.ttl();
    debug!(backend = ?settings.backend, ttl_secs = settings.ttl_secs, "opening cache backend");
    let adapter: Arc<dyn CacheAdapter> = match settings.backend {
        CacheBackend::None => return Ok(None),
        CacheBackend::Memory => Arc::new(MemoryCache::new(ttl)),
        CacheBackend::Sqlite => Arc::new(SqliteCache::open(&settings.path, ttl)?),
    };
    Ok(Some(adapter))
}

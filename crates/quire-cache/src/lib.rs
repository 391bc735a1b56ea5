//! # quire-cache
//!
//! [`CacheAdapter`](quire_core::CacheAdapter) backends for module output.
//!
//! - [`MemoryCache`]: process-local map with optional TTL
//! - [`SqliteCache`]: `SQLite` table with optional TTL, payloads stored as JSON
//! - [`open_backend`]: build the backend selected in settings

#![deny(unsafe_code)]

pub mod backend;
pub mod memory;
mod schema;
pub mod sqlite;

pub use backend::open_backend;
pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

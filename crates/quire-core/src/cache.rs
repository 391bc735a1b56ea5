//! Cache payloads and the cache adapter contract.
//!
//! A payload bundles everything a finalized module produced: its content, the
//! assets it declared, and the page keys it set. Keys travel inside the payload
//! so that a cache hit reproduces the same page-key side effects as a live
//! render.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::asset::AssetDescriptor;

/// Serialized bundle representing a module's finalized output.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePayload {
    /// Rendered module content.
    pub content: String,
    /// Assets the module declared.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<AssetDescriptor>,
    /// Page keys the module set while producing its content.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub keys: BTreeMap<String, String>,
}

/// Errors raised by cache backends.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backing store failed.
    #[error("cache storage error: {0}")]
    Storage(String),

    /// A payload could not be encoded or decoded.
    #[error("cache serialization error: {0}")]
    Serialization(String),

    /// Filesystem error while preparing the store.
    #[error("IO error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Storage collaborator consulted by the page composer around each module.
///
/// Implementations need no transactional discipline: a read followed by a
/// write is not atomic and concurrent renders against one key race freely.
pub trait CacheAdapter: Send + Sync {
    /// Fetch a payload, `None` when absent or expired.
    fn get(&self, key: &str) -> Result<Option<CachePayload>, CacheError>;

    /// Store a payload under `key`, replacing any previous entry.
    fn put(&self, key: &str, payload: &CachePayload) -> Result<(), CacheError>;

    /// Remove the entry for `key`. Returns whether an entry existed.
    fn purge(&self, key: &str) -> Result<bool, CacheError>;

    /// Whether the forced-clear signal should bypass (and purge) cached entries.
    fn should_bypass(&self, force: bool) -> bool {
        force
    }
}

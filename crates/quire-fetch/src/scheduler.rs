//! The batch contract.

use std::collections::BTreeMap;

use async_trait::async_trait;
use quire_core::{FetchRequest, FetchResult};

/// Operations of one round, keyed by a caller-chosen correlation key.
pub type Batch = BTreeMap<usize, FetchRequest>;

/// One result per key of the submitted [`Batch`].
pub type BatchResults = BTreeMap<usize, FetchResult>;

/// Executes a batch of independent operations concurrently.
///
/// Implementations must return exactly the input keys. A failing operation
/// yields `Err` for its own key and never affects its siblings; the call
/// itself does not fail.
#[async_trait]
pub trait FetchScheduler: Send + Sync {
    /// Run every operation and wait for all of them to settle.
    async fn execute_batch(&self, batch: Batch) -> BatchResults;
}

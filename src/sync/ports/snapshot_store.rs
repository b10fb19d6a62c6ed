//! Snapshot persistence port.

use crate::graph::domain::ContentHash;
use crate::sync::domain::{RunId, Snapshot};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for snapshot store operations.
pub type SnapshotStoreResult<T> = Result<T, SnapshotStoreError>;

/// Durable snapshot storage, addressed by source hash and run identifier.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persists a snapshot, replacing any earlier snapshot of the same run.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotStoreError::Persistence`] when the write fails.
    async fn save(&self, snapshot: &Snapshot) -> SnapshotStoreResult<()>;

    /// Loads the latest snapshot of a run.
    ///
    /// Returns `None` when the run has no snapshot.
    async fn load(&self, run_id: RunId) -> SnapshotStoreResult<Option<Snapshot>>;

    /// Loads the most recently taken snapshot for a source document.
    async fn latest_for_source(&self, hash: &ContentHash) -> SnapshotStoreResult<Option<Snapshot>>;

    /// Loads the most recently taken snapshot whose graph was produced from
    /// `source_path`, whatever the document's content was at the time.
    async fn latest_for_path(&self, source_path: &str) -> SnapshotStoreResult<Option<Snapshot>>;
}

/// Errors returned by snapshot store implementations.
#[derive(Debug, Clone, Error)]
pub enum SnapshotStoreError {
    /// A stored snapshot could not be decoded.
    #[error("corrupt snapshot for run {run_id}: {reason}")]
    Corrupt {
        /// Run whose snapshot is unreadable.
        run_id: String,
        /// Decoder message.
        reason: String,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl SnapshotStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

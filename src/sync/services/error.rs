//! Service-level errors for reconciliation runs.

use crate::graph::domain::GraphDomainError;
use crate::sync::domain::{RunId, SyncDomainError};
use crate::sync::ports::SnapshotStoreError;
use crate::tracker::ports::TrackerError;
use thiserror::Error;

/// Errors that abort a whole run.
///
/// Node-local problems never surface here; they are collected in the
/// [`crate::sync::domain::RunSummary`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// The graph failed structural validation; nothing was written.
    #[error("invalid task graph: {0}")]
    InvalidGraph(#[from] GraphDomainError),

    /// The tracker rejected credentials or stayed unreachable.
    #[error("run {run_id} aborted: {source}")]
    Fatal {
        /// Run that was aborted; resumable from its last snapshot.
        run_id: RunId,
        /// Tracker failure.
        source: TrackerError,
    },

    /// A tracker call failed outside node reconciliation.
    #[error(transparent)]
    Tracker(TrackerError),

    /// No snapshot exists for the run.
    #[error("no snapshot found for run {0}")]
    RunNotFound(RunId),

    /// Snapshot persistence failed.
    #[error(transparent)]
    Snapshot(#[from] SnapshotStoreError),

    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] SyncDomainError),
}

/// Result type for sync service operations.
pub type SyncResult<T> = Result<T, SyncError>;

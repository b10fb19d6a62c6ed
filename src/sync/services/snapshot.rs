//! Snapshot persistence and replay.

use super::{SyncError, SyncResult};
use crate::graph::domain::{GraphMetadata, NodeId};
use crate::sync::domain::{IdentityMapping, RunId, RunState};
use crate::sync::ports::{SnapshotStore, SnapshotStoreResult};
use mockable::Clock;
use std::sync::Arc;
use tracing::{debug, info};

/// Writes run snapshots and rebuilds run state from them.
pub struct SnapshotManager<S, C>
where
    S: SnapshotStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
}

impl<S, C> SnapshotManager<S, C>
where
    S: SnapshotStore,
    C: Clock + Send + Sync,
{
    /// Creates a snapshot manager.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self { store, clock }
    }

    /// Persists the current run state.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn snapshot(&self, state: &RunState) -> SnapshotStoreResult<()> {
        let snapshot = state.to_snapshot(self.clock.utc());
        self.store.save(&snapshot).await?;
        debug!(
            run_id = %state.run_id,
            mapped = state.mapping.len(),
            processed = state.progress.processed().len(),
            "snapshot taken"
        );
        Ok(())
    }

    /// Rebuilds run state from the latest snapshot of a run.
    ///
    /// Returns the state together with the first unprocessed node, or `None`
    /// when every node was processed. Replaying never mutates the stored
    /// snapshot, so it is safe to repeat.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RunNotFound`] when the run has no snapshot.
    pub async fn replay(&self, run_id: RunId) -> SyncResult<(RunState, Option<NodeId>)> {
        let snapshot = self
            .store
            .load(run_id)
            .await?
            .ok_or(SyncError::RunNotFound(run_id))?;
        let resume_point = snapshot.resume_point().cloned();
        info!(
            %run_id,
            resume_point = ?resume_point,
            mapped = snapshot.mapping.len(),
            "replaying snapshot"
        );
        Ok((RunState::from(snapshot), resume_point))
    }

    /// Copies mapping entries from earlier runs over the same document.
    ///
    /// The latest snapshot with the same content hash is absorbed first, then
    /// the latest snapshot for the same source path, so an edited document
    /// keeps the identities its earlier versions established. Entries that
    /// conflict with ones already absorbed are skipped. Returns the number of
    /// entries added.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn seed_mapping(
        &self,
        source: &GraphMetadata,
        mapping: &mut IdentityMapping,
    ) -> SnapshotStoreResult<usize> {
        let mut added = 0;
        if let Some(previous) = self.store.latest_for_source(&source.content_hash).await? {
            let absorbed = mapping.absorb(&previous.mapping);
            debug!(source = %source.content_hash, previous_run = %previous.run_id, absorbed, "seeded mapping from same document");
            added += absorbed;
        }
        if let Some(previous) = self.store.latest_for_path(&source.source_path).await? {
            let absorbed = mapping.absorb(&previous.mapping);
            debug!(path = %source.source_path, previous_run = %previous.run_id, absorbed, "seeded mapping from earlier revision");
            added += absorbed;
        }
        Ok(added)
    }
}

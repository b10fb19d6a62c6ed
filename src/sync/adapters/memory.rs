//! In-memory snapshot store for tests.

use crate::graph::domain::ContentHash;
use crate::sync::{
    domain::{RunId, Snapshot},
    ports::{SnapshotStore, SnapshotStoreError, SnapshotStoreResult},
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory snapshot store.
#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshotStore {
    state: Arc<RwLock<InMemorySnapshotState>>,
}

#[derive(Debug, Default)]
struct InMemorySnapshotState {
    snapshots: HashMap<RunId, Snapshot>,
    saves: usize,
}

impl InMemorySnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many snapshots have been written.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.state.read().map(|state| state.saves).unwrap_or(0)
    }
}

fn lock_error(err: impl ToString) -> SnapshotStoreError {
    SnapshotStoreError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, snapshot: &Snapshot) -> SnapshotStoreResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.snapshots.insert(snapshot.run_id, snapshot.clone());
        state.saves += 1;
        Ok(())
    }

    async fn load(&self, run_id: RunId) -> SnapshotStoreResult<Option<Snapshot>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.snapshots.get(&run_id).cloned())
    }

    async fn latest_for_source(&self, hash: &ContentHash) -> SnapshotStoreResult<Option<Snapshot>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state
            .snapshots
            .values()
            .filter(|snapshot| snapshot.source_hash() == hash)
            .max_by_key(|snapshot| snapshot.taken_at)
            .cloned())
    }

    async fn latest_for_path(&self, source_path: &str) -> SnapshotStoreResult<Option<Snapshot>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state
            .snapshots
            .values()
            .filter(|snapshot| snapshot.source_path() == source_path)
            .max_by_key(|snapshot| snapshot.taken_at)
            .cloned())
    }
}

//! Port contracts for run persistence.

mod snapshot_store;

pub use snapshot_store::{SnapshotStore, SnapshotStoreError, SnapshotStoreResult};

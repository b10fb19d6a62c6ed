//! Adapter implementations of the sync ports.

pub mod fs;
pub mod memory;

pub use fs::FsSnapshotStore;
pub use memory::InMemorySnapshotStore;

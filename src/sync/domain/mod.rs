//! Domain model for reconciliation runs.
//!
//! Holds the durable node/item identity mapping, derived blocked state,
//! snapshots and progress for replay, per-run summaries, and the explicit
//! configuration passed into the sync services.

mod blocked;
mod config;
mod content;
mod error;
mod ids;
mod mapping;
mod snapshot;
mod summary;

pub use blocked::{BlockedState, DependencyStatus};
pub use config::{HierarchyMode, SyncConfig};
pub use content::{GENERATOR_NAME, metadata_for, render_body, render_content};
pub use error::SyncDomainError;
pub use ids::RunId;
pub use mapping::{IdentityMapping, MappingEntry};
pub use snapshot::{Progress, RunState, Snapshot};
pub use summary::{FailureKind, NodeFailure, NodeOutcome, RunSummary};

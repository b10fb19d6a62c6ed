//! Application services for reconciliation runs.

mod breakdown;
mod dependency;
mod engine;
mod error;
mod hierarchy;
mod identity;
mod reconciler;
mod snapshot;

pub use breakdown::{BreakdownError, BreakdownOutcome, BreakdownRequest};
pub use dependency::{BlockedEvaluation, BlockedSweep, DependencyStateMachine};
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use hierarchy::{CrossReferenceStrategy, HierarchyLinker, HierarchyStrategy, NativeStrategy};
pub use identity::{IdentityResolver, Resolution};
pub use reconciler::{ReconcileScope, Reconciler};
pub use snapshot::SnapshotManager;

//! Run orchestration: reconcile, link, unblock, snapshot.

use super::{
    BlockedSweep, DependencyStateMachine, HierarchyLinker, ReconcileScope, Reconciler,
    SnapshotManager, SyncError, SyncResult,
};
use crate::graph::domain::TaskGraph;
use crate::sync::domain::{
    FailureKind, IdentityMapping, NodeFailure, RunId, RunState, RunSummary, SyncConfig,
};
use crate::sync::ports::SnapshotStore;
use crate::tracker::{
    domain::ItemId,
    ports::{TrackerClient, TrackerError},
};
use mockable::Clock;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Entry point for sync runs, replays, sweeps and close triggers.
///
/// Runs share no lock. Concurrent runs against one tracker converge because
/// every write sets a value to match the graph.
pub struct SyncEngine<T, S, C>
where
    T: TrackerClient,
    S: SnapshotStore,
    C: Clock + Send + Sync,
{
    reconciler: Reconciler<T, C>,
    dependencies: DependencyStateMachine<T>,
    linker: HierarchyLinker,
    snapshots: SnapshotManager<S, C>,
}

impl<T, S, C> SyncEngine<T, S, C>
where
    T: TrackerClient,
    S: SnapshotStore,
    C: Clock + Send + Sync,
{
    /// Creates an engine.
    #[must_use]
    pub fn new(
        tracker: Arc<T>,
        store: Arc<S>,
        clock: Arc<C>,
        config: &SyncConfig,
        linker: HierarchyLinker,
    ) -> Self {
        Self {
            reconciler: Reconciler::new(
                Arc::clone(&tracker),
                config.labels.clone(),
                Arc::clone(&clock),
            ),
            dependencies: DependencyStateMachine::new(tracker, config.labels.clone()),
            linker,
            snapshots: SnapshotManager::new(store, clock),
        }
    }

    /// Returns the snapshot manager.
    #[must_use]
    pub const fn snapshots(&self) -> &SnapshotManager<S, C> {
        &self.snapshots
    }

    /// Starts a new run over `graph`.
    ///
    /// The graph is validated before any tracker call. The mapping is seeded
    /// from earlier runs over the same source document, including runs over
    /// earlier revisions of it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidGraph`] for structural problems,
    /// [`SyncError::Fatal`] for fatal tracker failures, and
    /// [`SyncError::Snapshot`] for persistence failures.
    pub async fn run(&self, graph: TaskGraph, cancel: &CancellationToken) -> SyncResult<RunSummary> {
        graph.validate()?;
        let mut mapping = IdentityMapping::new();
        self.snapshots
            .seed_mapping(graph.metadata(), &mut mapping)
            .await?;
        let mut state = RunState::new(RunId::new(), graph, mapping);
        info!(
            run_id = %state.run_id,
            nodes = state.graph.nodes().len(),
            seeded = state.mapping.len(),
            "starting sync run"
        );
        self.snapshots.snapshot(&state).await?;
        self.execute(&mut state, &ReconcileScope::All, cancel).await
    }

    /// Resumes a run from its latest snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RunNotFound`] when the run has no snapshot, and
    /// otherwise the same errors as [`SyncEngine::run`].
    pub async fn resume(&self, run_id: RunId, cancel: &CancellationToken) -> SyncResult<RunSummary> {
        let (mut state, resume_point) = self.snapshots.replay(run_id).await?;
        state.graph.validate()?;
        info!(%run_id, resume_point = ?resume_point, "resuming sync run");
        self.execute(&mut state, &ReconcileScope::All, cancel).await
    }

    /// Re-evaluates the blocked state of every node of a run.
    ///
    /// Nodes that could not be evaluated are listed in the sweep's failures.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RunNotFound`] when the run has no snapshot, or
    /// [`SyncError::Fatal`] / [`SyncError::Tracker`] when the tracker fails.
    pub async fn sweep(&self, run_id: RunId) -> SyncResult<BlockedSweep> {
        let (state, _) = self.snapshots.replay(run_id).await?;
        self.dependencies
            .sweep(&state.graph, &state.mapping, &ReconcileScope::All)
            .await
            .map_err(|source| tracker_error(run_id, source))
    }

    /// Re-evaluates the dependents of a closed item.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RunNotFound`] when the run has no snapshot, or
    /// [`SyncError::Fatal`] / [`SyncError::Tracker`] when the tracker fails.
    pub async fn item_closed(&self, run_id: RunId, item: ItemId) -> SyncResult<BlockedSweep> {
        let (state, _) = self.snapshots.replay(run_id).await?;
        self.dependencies
            .on_item_closed(&state.graph, &state.mapping, item)
            .await
            .map_err(|source| tracker_error(run_id, source))
    }

    /// Reconciles, links and unblocks the in-scope nodes, then snapshots.
    pub(super) async fn execute(
        &self,
        state: &mut RunState,
        scope: &ReconcileScope,
        cancel: &CancellationToken,
    ) -> SyncResult<RunSummary> {
        let mut summary = self
            .reconciler
            .reconcile(state, scope, cancel, &self.snapshots)
            .await?;
        if summary.cancelled {
            return Ok(summary);
        }

        self.link_hierarchy(state, scope, &mut summary).await?;

        let sweep = self
            .dependencies
            .sweep(&state.graph, &state.mapping, scope)
            .await
            .map_err(|source| tracker_error(state.run_id, source))?;
        for evaluation in sweep.evaluations {
            for dependency in evaluation.unresolved {
                summary.warn(NodeFailure::new(
                    evaluation.node_id.clone(),
                    FailureKind::UnresolvedDependency { dependency },
                ));
            }
        }
        for failure in sweep.failures {
            summary.fail(failure);
        }

        self.snapshots.snapshot(state).await?;
        info!(
            run_id = %state.run_id,
            created = summary.created.len(),
            updated = summary.updated.len(),
            unchanged = summary.unchanged.len(),
            failed = summary.failed.len(),
            "sync run finished"
        );
        Ok(summary)
    }

    async fn link_hierarchy(
        &self,
        state: &RunState,
        scope: &ReconcileScope,
        summary: &mut RunSummary,
    ) -> SyncResult<()> {
        for node in state.graph.nodes() {
            let Some(parent) = state.mapping.item_for(node.id()) else {
                continue;
            };
            let children: Vec<ItemId> = node
                .children()
                .iter()
                .filter(|child| scope.includes(node.id()) || scope.includes(child))
                .filter_map(|child| state.mapping.item_for(child))
                .collect();
            if children.is_empty() {
                continue;
            }
            match self.linker.link_children(parent, &children).await {
                Ok(_) => {}
                Err(err) if err.is_fatal() => return Err(tracker_error(state.run_id, err)),
                Err(err) => {
                    warn!(node_id = %node.id(), %err, "hierarchy linking failed");
                    summary.warn(NodeFailure::new(
                        node.id().clone(),
                        FailureKind::Hierarchy {
                            message: err.to_string(),
                        },
                    ));
                }
            }
        }
        Ok(())
    }
}

fn tracker_error(run_id: RunId, source: TrackerError) -> SyncError {
    if source.is_fatal() {
        SyncError::Fatal { run_id, source }
    } else {
        SyncError::Tracker(source)
    }
}

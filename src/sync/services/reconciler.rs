//! Creates and updates tracker items so they match graph nodes.

use super::{IdentityResolver, Resolution, SnapshotManager, SyncError, SyncResult};
use crate::graph::domain::{NodeId, TaskNode};
use crate::sync::domain::{
    FailureKind, IdentityMapping, NodeFailure, NodeOutcome, RunState, RunSummary,
    SyncDomainError, render_body,
};
use crate::sync::ports::SnapshotStore;
use crate::tracker::{
    domain::{ItemBody, ItemDraft, ItemId, ItemUpdate, LabelConfig, TrackerItem},
    ports::{TrackerClient, TrackerError},
};
use mockable::Clock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Which nodes a reconciliation pass covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReconcileScope {
    /// Every node in the graph.
    #[default]
    All,
    /// Only the listed nodes.
    Nodes(BTreeSet<NodeId>),
}

impl ReconcileScope {
    /// Returns `true` when the node is covered.
    #[must_use]
    pub fn includes(&self, id: &NodeId) -> bool {
        match self {
            Self::All => true,
            Self::Nodes(ids) => ids.contains(id),
        }
    }
}

/// Why a single node stopped.
enum NodeError {
    Local(FailureKind),
    Fatal(TrackerError),
}

impl From<TrackerError> for NodeError {
    fn from(err: TrackerError) -> Self {
        if err.is_fatal() {
            return Self::Fatal(err);
        }
        let message = err.to_string();
        if matches!(err, TrackerError::RetriesExhausted { .. }) || err.is_transient() {
            Self::Local(FailureKind::RetriesExhausted { message })
        } else {
            Self::Local(FailureKind::Rejected { message })
        }
    }
}

impl From<SyncDomainError> for NodeError {
    fn from(err: SyncDomainError) -> Self {
        Self::Local(FailureKind::Rejected {
            message: err.to_string(),
        })
    }
}

type NodeResult<T> = Result<T, NodeError>;

/// Drives identity resolution and tracker writes node by node.
pub struct Reconciler<T, C>
where
    T: TrackerClient,
    C: Clock + Send + Sync,
{
    tracker: Arc<T>,
    resolver: IdentityResolver<T>,
    labels: LabelConfig,
    clock: Arc<C>,
}

impl<T, C> Reconciler<T, C>
where
    T: TrackerClient,
    C: Clock + Send + Sync,
{
    /// Creates a reconciler.
    #[must_use]
    pub fn new(tracker: Arc<T>, labels: LabelConfig, clock: Arc<C>) -> Self {
        Self {
            resolver: IdentityResolver::new(Arc::clone(&tracker)),
            tracker,
            labels,
            clock,
        }
    }

    /// Reconciles every in-scope node in graph order.
    ///
    /// Nodes already marked processed are skipped. After each node the run
    /// state is snapshotted, so an interrupted run resumes after the last
    /// finished node. Cancellation is honoured between nodes.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Fatal`] when the tracker rejects credentials or
    /// stays unreachable; no snapshot is written for the failing node.
    /// Returns [`SyncError::Snapshot`] when a snapshot cannot be persisted.
    pub async fn reconcile<S>(
        &self,
        state: &mut RunState,
        scope: &ReconcileScope,
        cancel: &CancellationToken,
        snapshots: &SnapshotManager<S, C>,
    ) -> SyncResult<RunSummary>
    where
        S: SnapshotStore,
    {
        let mut summary = RunSummary::new(state.run_id);
        let order: Vec<NodeId> = state
            .graph
            .nodes()
            .iter()
            .map(|node| node.id().clone())
            .filter(|id| scope.includes(id))
            .collect();

        for id in order {
            if cancel.is_cancelled() {
                info!(run_id = %state.run_id, "run cancelled between nodes");
                summary.cancelled = true;
                break;
            }
            if state.progress.is_processed(&id) {
                summary.skipped.push(id);
                continue;
            }
            let Some(node) = state.graph.node(&id) else {
                continue;
            };

            match self.reconcile_node(node, &mut state.mapping).await {
                Ok(outcome) => {
                    info!(node_id = %id, item = %outcome.item(), ?outcome, "node reconciled");
                    summary.record(id.clone(), outcome);
                    state.progress.mark_processed(id);
                }
                Err(NodeError::Local(kind)) => {
                    let failure = NodeFailure::new(id.clone(), kind);
                    warn!(node_id = %id, %failure, "node failed");
                    summary.fail(failure);
                    state.progress.mark_failed(id);
                }
                Err(NodeError::Fatal(source)) => {
                    warn!(node_id = %id, %source, "fatal tracker error, aborting run");
                    return Err(SyncError::Fatal {
                        run_id: state.run_id,
                        source,
                    });
                }
            }
            snapshots.snapshot(state).await?;
        }
        Ok(summary)
    }

    async fn reconcile_node(
        &self,
        node: &TaskNode,
        mapping: &mut IdentityMapping,
    ) -> NodeResult<NodeOutcome> {
        match self.resolver.resolve(node, mapping).await? {
            Resolution::Mapped(item) => self.sync_existing(node, &item).await,
            Resolution::Recovered(item) => {
                mapping.record(node.id().clone(), item.id)?;
                self.sync_existing(node, &item).await
            }
            Resolution::Missing(item) => Err(NodeError::Local(FailureKind::MissingItem { item })),
            Resolution::Ambiguous(candidates) => {
                Err(NodeError::Local(FailureKind::AmbiguousIdentity { candidates }))
            }
            Resolution::Absent => self.create(node, mapping).await,
        }
    }

    async fn create(&self, node: &TaskNode, mapping: &mut IdentityMapping) -> NodeResult<NodeOutcome> {
        let body = render_body(node, self.clock.utc())?;
        let mut labels = self.labels.structural(node.is_leaf());
        if !node.dependencies().is_empty() {
            labels.insert(self.labels.blocked.clone());
        }
        let draft = ItemDraft::new(node.title(), body.render().map_err(SyncDomainError::from)?)
            .map_err(SyncDomainError::from)?
            .with_labels(labels);
        let created = self.tracker.create_item(&draft).await?;

        let canonical = self.converge(node, created).await?;
        mapping.record(node.id().clone(), canonical)?;
        if canonical == created {
            return Ok(NodeOutcome::Created(created));
        }

        let item = self
            .tracker
            .get_item(canonical)
            .await?
            .ok_or(NodeError::Local(FailureKind::MissingItem { item: canonical }))?;
        self.sync_existing(node, &item).await
    }

    /// Collapses items created concurrently for the same node onto the
    /// lowest-numbered one. Returns the canonical item.
    async fn converge(&self, node: &TaskNode, created: ItemId) -> NodeResult<ItemId> {
        let mut candidates = self.tracker.find_items_by_metadata_id(node.id()).await?;
        if !candidates.contains(&created) {
            candidates.push(created);
        }
        let canonical = candidates.iter().copied().min().unwrap_or(created);
        if canonical != created {
            warn!(node_id = %node.id(), %created, %canonical, "closing concurrently created duplicate");
            self.tracker
                .add_label(created, &self.labels.duplicate)
                .await?;
            self.tracker
                .comment(created, &format!("Duplicate of {canonical}."))
                .await?;
            self.tracker.close_item(created).await?;
        }
        Ok(canonical)
    }

    /// Rewrites an existing item when it no longer matches the node.
    async fn sync_existing(&self, node: &TaskNode, item: &TrackerItem) -> NodeResult<NodeOutcome> {
        let current = ItemBody::parse(&item.body).unwrap_or_default();
        let desired = render_body(node, self.clock.utc())?;

        let same_content = item.title == node.title()
            && current.content() == desired.content()
            && current
                .metadata()
                .zip(desired.metadata())
                .is_some_and(|(stored, wanted)| stored.same_plan(wanted));

        let managed = self.labels.managed();
        let mut labels: BTreeSet<String> = item
            .labels
            .iter()
            .filter(|label| !managed.contains(*label))
            .cloned()
            .collect();
        labels.extend(self.labels.structural(node.is_leaf()));

        let mut update = ItemUpdate::default();
        if item.title != node.title() {
            update.title = Some(node.title().to_owned());
        }
        if !same_content {
            let body = desired.with_links_from(&current);
            update.body = Some(body.render().map_err(SyncDomainError::from)?);
        }
        if labels != item.labels {
            update.labels = Some(labels);
        }

        if update.is_empty() {
            return Ok(NodeOutcome::Unchanged(item.id));
        }
        self.tracker.update_item(item.id, &update).await?;
        Ok(NodeOutcome::Updated(item.id))
    }
}

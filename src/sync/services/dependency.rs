//! Blocked-label maintenance driven by dependency item states.

use super::ReconcileScope;
use crate::graph::domain::{NodeId, TaskGraph, TaskNode};
use crate::sync::domain::{
    BlockedState, DependencyStatus, FailureKind, IdentityMapping, NodeFailure,
};
use crate::tracker::{
    domain::{ItemId, ItemState, LabelConfig},
    ports::{TrackerClient, TrackerError, TrackerResult},
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of evaluating one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedEvaluation {
    /// Evaluated node.
    pub node_id: NodeId,
    /// The node's item, if mapped.
    pub item: Option<ItemId>,
    /// Derived state.
    pub state: BlockedState,
    /// Whether the blocked label was added or removed.
    pub changed: bool,
    /// Dependencies with no live tracker item.
    pub unresolved: Vec<NodeId>,
}

/// Result of re-evaluating a set of nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockedSweep {
    /// Nodes evaluated successfully, in graph order.
    pub evaluations: Vec<BlockedEvaluation>,
    /// Nodes whose blocked label may be stale.
    pub failures: Vec<NodeFailure>,
}

impl BlockedSweep {
    /// Returns `true` when every node was evaluated.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Per-pass cache of dependency item states.
type StateCache = HashMap<ItemId, Option<ItemState>>;

/// Keeps each item's blocked label in line with its dependencies.
///
/// Evaluation is a pure function of current tracker state; applying it twice
/// without an external change performs no writes the second time.
pub struct DependencyStateMachine<T>
where
    T: TrackerClient,
{
    tracker: Arc<T>,
    labels: LabelConfig,
}

impl<T> DependencyStateMachine<T>
where
    T: TrackerClient,
{
    /// Creates a state machine.
    #[must_use]
    pub const fn new(tracker: Arc<T>, labels: LabelConfig) -> Self {
        Self { tracker, labels }
    }

    /// Derives a node's state from its dependencies' items.
    ///
    /// Returns the state and the dependencies that did not resolve to a live
    /// item. Unresolved dependencies keep the node blocked.
    ///
    /// # Errors
    ///
    /// Propagates tracker failures.
    pub async fn evaluate(
        &self,
        node: &TaskNode,
        mapping: &IdentityMapping,
    ) -> TrackerResult<(BlockedState, Vec<NodeId>)> {
        let mut cache = StateCache::new();
        self.evaluate_cached(node, mapping, &mut cache).await
    }

    async fn evaluate_cached(
        &self,
        node: &TaskNode,
        mapping: &IdentityMapping,
        cache: &mut StateCache,
    ) -> TrackerResult<(BlockedState, Vec<NodeId>)> {
        let mut statuses = Vec::with_capacity(node.dependencies().len());
        let mut unresolved = Vec::new();
        for dependency in node.dependencies() {
            let state = match mapping.item_for(dependency) {
                Some(id) => self.item_state(id, cache).await?,
                None => None,
            };
            let status = match state {
                Some(ItemState::Open) => DependencyStatus::Open,
                Some(ItemState::Closed) => DependencyStatus::Closed,
                None => {
                    unresolved.push(dependency.clone());
                    DependencyStatus::Unresolved
                }
            };
            statuses.push(status);
        }
        Ok((BlockedState::derive(statuses), unresolved))
    }

    async fn item_state(&self, id: ItemId, cache: &mut StateCache) -> TrackerResult<Option<ItemState>> {
        if let Some(state) = cache.get(&id) {
            return Ok(*state);
        }
        let state = self.tracker.get_item_state(id).await?;
        cache.insert(id, state);
        Ok(state)
    }

    /// Adds or removes the blocked label so it matches `state`.
    ///
    /// Returns `true` when a label was changed.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::NotFound`] when the item no longer exists.
    pub async fn apply(&self, item: ItemId, state: BlockedState) -> TrackerResult<bool> {
        let current = self
            .tracker
            .get_item(item)
            .await?
            .ok_or(TrackerError::NotFound(item))?;
        let labelled = current.has_label(&self.labels.blocked);
        match (state, labelled) {
            (BlockedState::Blocked, false) => {
                self.tracker.add_label(item, &self.labels.blocked).await?;
                Ok(true)
            }
            (BlockedState::Unblocked, true) => {
                self.tracker.remove_label(item, &self.labels.blocked).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Re-evaluates every mapped, in-scope node.
    ///
    /// A node-local tracker failure is recorded in the sweep and the
    /// remaining nodes are still evaluated.
    ///
    /// # Errors
    ///
    /// Stops only on a fatal tracker failure.
    pub async fn sweep(
        &self,
        graph: &TaskGraph,
        mapping: &IdentityMapping,
        scope: &ReconcileScope,
    ) -> TrackerResult<BlockedSweep> {
        let mut cache = StateCache::new();
        let mut sweep = BlockedSweep::default();
        for node in graph.nodes().iter().filter(|node| scope.includes(node.id())) {
            self.collect(node, mapping, &mut cache, &mut sweep).await?;
        }
        Ok(sweep)
    }

    /// Re-evaluates the dependents of the node mapped to a closed item.
    ///
    /// Returns an empty sweep when the item is not mapped.
    ///
    /// # Errors
    ///
    /// Stops only on a fatal tracker failure.
    pub async fn on_item_closed(
        &self,
        graph: &TaskGraph,
        mapping: &IdentityMapping,
        closed: ItemId,
    ) -> TrackerResult<BlockedSweep> {
        let mut sweep = BlockedSweep::default();
        let Some(node_id) = mapping.node_for(closed) else {
            info!(item = %closed, "closed item is not mapped to a node");
            return Ok(sweep);
        };
        let mut cache = StateCache::new();
        for dependent in graph.dependents_of(node_id) {
            self.collect(dependent, mapping, &mut cache, &mut sweep).await?;
        }
        Ok(sweep)
    }

    async fn collect(
        &self,
        node: &TaskNode,
        mapping: &IdentityMapping,
        cache: &mut StateCache,
        sweep: &mut BlockedSweep,
    ) -> TrackerResult<()> {
        match self.run_node(node, mapping, cache).await {
            Ok(evaluation) => sweep.evaluations.push(evaluation),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(node_id = %node.id(), %err, "blocked state not evaluated");
                sweep.failures.push(NodeFailure::new(
                    node.id().clone(),
                    FailureKind::BlockedLabel {
                        message: err.to_string(),
                    },
                ));
            }
        }
        Ok(())
    }

    async fn run_node(
        &self,
        node: &TaskNode,
        mapping: &IdentityMapping,
        cache: &mut StateCache,
    ) -> TrackerResult<BlockedEvaluation> {
        let (state, unresolved) = self.evaluate_cached(node, mapping, cache).await?;
        for dependency in &unresolved {
            warn!(node_id = %node.id(), %dependency, "dependency has no tracker item, keeping node blocked");
        }
        let item = mapping.item_for(node.id());
        let changed = match item {
            Some(id) => match self.apply(id, state).await {
                Ok(changed) => changed,
                Err(TrackerError::NotFound(missing)) => {
                    warn!(node_id = %node.id(), item = %missing, "mapped item no longer exists");
                    false
                }
                Err(err) => return Err(err),
            },
            None => false,
        };
        if changed {
            info!(node_id = %node.id(), state = ?state, "blocked state changed");
        }
        Ok(BlockedEvaluation {
            node_id: node.id().clone(),
            item,
            state,
            changed,
            unresolved,
        })
    }
}

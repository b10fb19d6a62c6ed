//! On-demand breakdown of one node into a bounded sub-graph.

use super::{ReconcileScope, SyncEngine, SyncError};
use crate::graph::{
    domain::{GraphDomainError, NodeId, SubGraph},
    ports::{NodeExpander, ProducerError},
};
use crate::sync::domain::{RunId, RunSummary};
use crate::sync::ports::SnapshotStore;
use crate::tracker::ports::TrackerClient;
use mockable::Clock;
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Parameters of a breakdown request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakdownRequest {
    /// Run whose graph holds the node.
    pub run_id: RunId,
    /// Node to break down.
    pub node_id: NodeId,
    /// Maximum levels generated below the node.
    pub depth_limit: u32,
    /// Leaves above this complexity are split further.
    pub complexity_threshold: u32,
    /// Re-expand even if the node was expanded with the same arguments.
    pub force: bool,
}

/// What a breakdown request did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakdownOutcome {
    /// Expanded node.
    pub node_id: NodeId,
    /// Nodes produced by the expansion, in merge order.
    pub produced: Vec<NodeId>,
    /// `false` when an identical earlier expansion made this a no-op.
    pub expanded: bool,
    /// Summary of the scoped reconciliation, when one ran.
    pub summary: Option<RunSummary>,
}

/// Errors returned by breakdown requests.
#[derive(Debug, Error)]
pub enum BreakdownError {
    /// The node is not in the run's graph.
    #[error("node {0} not found in run graph")]
    NodeNotFound(NodeId),

    /// The expander generated nodes outside the requested bounds.
    #[error("generated node {node} violates breakdown bounds: {reason}")]
    OutOfBounds {
        /// Offending node.
        node: NodeId,
        /// Which bound was violated.
        reason: String,
    },

    /// The expander failed.
    #[error(transparent)]
    Producer(#[from] ProducerError),

    /// Merging produced an invalid graph.
    #[error(transparent)]
    Graph(#[from] GraphDomainError),

    /// Reconciling the new nodes failed.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Checks depth and leaf-complexity bounds of a generated sub-graph.
fn check_bounds(
    sub_graph: &SubGraph,
    depth_limit: u32,
    complexity_threshold: u32,
) -> Result<(), BreakdownError> {
    let depths = sub_graph.depths();
    let parents: BTreeSet<&NodeId> = sub_graph
        .nodes
        .iter()
        .filter_map(|node| node.parent())
        .collect();
    for node in &sub_graph.nodes {
        let depth = depths.get(node.id()).copied().unwrap_or(1);
        if depth > depth_limit {
            return Err(BreakdownError::OutOfBounds {
                node: node.id().clone(),
                reason: format!("depth {depth} exceeds limit {depth_limit}"),
            });
        }
        let is_leaf = !parents.contains(node.id());
        if is_leaf && depth < depth_limit && node.complexity() > complexity_threshold {
            return Err(BreakdownError::OutOfBounds {
                node: node.id().clone(),
                reason: format!(
                    "leaf complexity {} exceeds threshold {complexity_threshold}",
                    node.complexity()
                ),
            });
        }
    }
    Ok(())
}

impl<T, S, C> SyncEngine<T, S, C>
where
    T: TrackerClient,
    S: SnapshotStore,
    C: Clock + Send + Sync,
{
    /// Breaks a node down and reconciles only the new nodes and their root.
    ///
    /// A node already expanded with the same depth limit and threshold is
    /// left alone unless `force` is set; forced re-expansion refreshes the
    /// earlier products in place.
    ///
    /// # Errors
    ///
    /// Returns [`BreakdownError`] when the node is unknown, the expander
    /// fails or breaks the bounds, the merged graph is invalid, or the
    /// scoped run fails.
    pub async fn expand<E>(
        &self,
        request: &BreakdownRequest,
        expander: &E,
        cancel: &CancellationToken,
    ) -> Result<BreakdownOutcome, BreakdownError>
    where
        E: NodeExpander,
    {
        let (mut state, _) = self.snapshots().replay(request.run_id).await?;
        let node = state
            .graph
            .node(&request.node_id)
            .cloned()
            .ok_or_else(|| BreakdownError::NodeNotFound(request.node_id.clone()))?;

        if !request.force
            && let Some(expansion) = node.expansion()
            && expansion.matches(request.depth_limit, request.complexity_threshold)
        {
            info!(node_id = %node.id(), "node already expanded with these arguments");
            return Ok(BreakdownOutcome {
                node_id: node.id().clone(),
                produced: expansion.produced.clone(),
                expanded: false,
                summary: None,
            });
        }

        let sub_graph = expander
            .breakdown(&node, request.depth_limit, request.complexity_threshold)
            .await?;
        check_bounds(&sub_graph, request.depth_limit, request.complexity_threshold)?;
        let produced = state.graph.merge_expansion(
            sub_graph,
            request.depth_limit,
            request.complexity_threshold,
        )?;
        state.graph.validate()?;

        let mut scope: BTreeSet<NodeId> = produced.iter().cloned().collect();
        scope.insert(node.id().clone());
        for id in &scope {
            state.progress.forget(id);
        }
        info!(
            run_id = %state.run_id,
            node_id = %node.id(),
            produced = produced.len(),
            "merged breakdown"
        );
        let summary = self
            .execute(&mut state, &ReconcileScope::Nodes(scope), cancel)
            .await?;
        Ok(BreakdownOutcome {
            node_id: node.id().clone(),
            produced,
            expanded: true,
            summary: Some(summary),
        })
    }
}

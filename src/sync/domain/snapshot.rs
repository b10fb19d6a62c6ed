//! Durable run snapshots.

use super::{IdentityMapping, RunId};
use crate::graph::domain::{ContentHash, NodeId, TaskGraph};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which nodes a run has finished with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    processed: BTreeSet<NodeId>,
    #[serde(default)]
    failed: BTreeSet<NodeId>,
}

impl Progress {
    /// Creates empty progress.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a node fully processed, clearing any earlier failure.
    pub fn mark_processed(&mut self, node: NodeId) {
        self.failed.remove(&node);
        self.processed.insert(node);
    }

    /// Clears any record of a node so the next run processes it again.
    pub fn forget(&mut self, node: &NodeId) {
        self.processed.remove(node);
        self.failed.remove(node);
    }

    /// Marks a node failed. Failed nodes are retried on resume.
    pub fn mark_failed(&mut self, node: NodeId) {
        self.failed.insert(node);
    }

    /// Returns `true` when the node was fully processed.
    #[must_use]
    pub fn is_processed(&self, node: &NodeId) -> bool {
        self.processed.contains(node)
    }

    /// Returns processed nodes.
    #[must_use]
    pub const fn processed(&self) -> &BTreeSet<NodeId> {
        &self.processed
    }

    /// Returns failed nodes.
    #[must_use]
    pub const fn failed(&self) -> &BTreeSet<NodeId> {
        &self.failed
    }
}

/// Mutable state of a run in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    /// Run identifier.
    pub run_id: RunId,
    /// Graph being reconciled.
    pub graph: TaskGraph,
    /// Identity mapping accumulated so far.
    pub mapping: IdentityMapping,
    /// Processed and failed nodes.
    pub progress: Progress,
}

impl RunState {
    /// Starts a run over `graph` with a pre-seeded mapping.
    #[must_use]
    pub fn new(run_id: RunId, graph: TaskGraph, mapping: IdentityMapping) -> Self {
        Self {
            run_id,
            graph,
            mapping,
            progress: Progress::new(),
        }
    }

    /// Captures the state as a snapshot taken at `taken_at`.
    #[must_use]
    pub fn to_snapshot(&self, taken_at: DateTime<Utc>) -> Snapshot {
        Snapshot {
            run_id: self.run_id,
            taken_at,
            graph: self.graph.clone(),
            mapping: self.mapping.clone(),
            progress: self.progress.clone(),
        }
    }
}

/// Self-contained record sufficient to resume a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Run the snapshot belongs to.
    pub run_id: RunId,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
    /// Graph as parsed and merged.
    pub graph: TaskGraph,
    /// Identity mapping accumulated so far.
    pub mapping: IdentityMapping,
    /// Processed and failed nodes.
    pub progress: Progress,
}

impl Snapshot {
    /// Returns the content hash of the source document.
    #[must_use]
    pub const fn source_hash(&self) -> &ContentHash {
        &self.graph.metadata().content_hash
    }

    /// Returns the path of the source document.
    #[must_use]
    pub fn source_path(&self) -> &str {
        &self.graph.metadata().source_path
    }

    /// Returns the first node, in graph order, not yet processed.
    #[must_use]
    pub fn resume_point(&self) -> Option<&NodeId> {
        self.graph
            .nodes()
            .iter()
            .map(|node| node.id())
            .find(|id| !self.progress.is_processed(id))
    }
}

impl From<Snapshot> for RunState {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            run_id: snapshot.run_id,
            graph: snapshot.graph,
            mapping: snapshot.mapping,
            progress: snapshot.progress,
        }
    }
}

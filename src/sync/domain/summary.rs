//! Per-run outcome reporting.

use super::RunId;
use crate::graph::domain::NodeId;
use crate::tracker::domain::ItemId;
use serde::Serialize;
use std::fmt;

/// Result of reconciling one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome {
    /// A new item was created.
    Created(ItemId),
    /// An existing item was rewritten to match the node.
    Updated(ItemId),
    /// The existing item already matched.
    Unchanged(ItemId),
}

impl NodeOutcome {
    /// Returns the item the node maps to.
    #[must_use]
    pub const fn item(self) -> ItemId {
        match self {
            Self::Created(id) | Self::Updated(id) | Self::Unchanged(id) => id,
        }
    }
}

/// Why a node could not be reconciled, or what needs operator attention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// Items with the node's title exist but none carries its metadata.
    AmbiguousIdentity {
        /// Same-titled items needing review.
        candidates: Vec<ItemId>,
    },
    /// Tracker calls kept failing transiently.
    RetriesExhausted {
        /// Final error message.
        message: String,
    },
    /// The tracker refused a request for this node.
    Rejected {
        /// Tracker message.
        message: String,
    },
    /// The mapped item no longer exists.
    MissingItem {
        /// Item on record.
        item: ItemId,
    },
    /// A dependency has no tracker item.
    UnresolvedDependency {
        /// Dependency without an item.
        dependency: NodeId,
    },
    /// Hierarchy linking failed.
    Hierarchy {
        /// Error message.
        message: String,
    },
    /// The node's blocked label could not be brought in line with its
    /// dependencies and may be stale.
    BlockedLabel {
        /// Error message.
        message: String,
    },
}

/// Node-local problem reported in a run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeFailure {
    /// Affected node.
    pub node_id: NodeId,
    /// What went wrong.
    #[serde(flatten)]
    pub kind: FailureKind,
}

impl NodeFailure {
    /// Creates a failure record.
    #[must_use]
    pub const fn new(node_id: NodeId, kind: FailureKind) -> Self {
        Self { node_id, kind }
    }
}

impl fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FailureKind::AmbiguousIdentity { candidates } => {
                let ids: Vec<String> = candidates.iter().map(ToString::to_string).collect();
                write!(
                    f,
                    "node {}: ambiguous identity, same-titled items {}",
                    self.node_id,
                    ids.join(", ")
                )
            }
            FailureKind::RetriesExhausted { message } => {
                write!(f, "node {}: retries exhausted: {message}", self.node_id)
            }
            FailureKind::Rejected { message } => {
                write!(f, "node {}: rejected: {message}", self.node_id)
            }
            FailureKind::MissingItem { item } => {
                write!(f, "node {}: mapped item {item} no longer exists", self.node_id)
            }
            FailureKind::UnresolvedDependency { dependency } => write!(
                f,
                "node {}: dependency {dependency} has no tracker item",
                self.node_id
            ),
            FailureKind::Hierarchy { message } => {
                write!(f, "node {}: hierarchy link failed: {message}", self.node_id)
            }
            FailureKind::BlockedLabel { message } => {
                write!(f, "node {}: blocked state not updated: {message}", self.node_id)
            }
        }
    }
}

/// User-visible summary of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Run identifier.
    pub run_id: RunId,
    /// Nodes for which an item was created.
    pub created: Vec<NodeId>,
    /// Nodes whose item was rewritten.
    pub updated: Vec<NodeId>,
    /// Nodes whose item already matched.
    pub unchanged: Vec<NodeId>,
    /// Nodes skipped because an earlier attempt already processed them.
    pub skipped: Vec<NodeId>,
    /// Nodes that could not be reconciled.
    pub failed: Vec<NodeFailure>,
    /// Problems that did not fail a node.
    pub warnings: Vec<NodeFailure>,
    /// Whether the run stopped early on cancellation.
    pub cancelled: bool,
}

impl RunSummary {
    /// Creates an empty summary.
    #[must_use]
    pub const fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            created: Vec::new(),
            updated: Vec::new(),
            unchanged: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            warnings: Vec::new(),
            cancelled: false,
        }
    }

    /// Records a node outcome.
    pub fn record(&mut self, node: NodeId, outcome: NodeOutcome) {
        match outcome {
            NodeOutcome::Created(_) => self.created.push(node),
            NodeOutcome::Updated(_) => self.updated.push(node),
            NodeOutcome::Unchanged(_) => self.unchanged.push(node),
        }
    }

    /// Records a node failure.
    pub fn fail(&mut self, failure: NodeFailure) {
        self.failed.push(failure);
    }

    /// Records a warning.
    pub fn warn(&mut self, warning: NodeFailure) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    /// Returns `true` when no node failed.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

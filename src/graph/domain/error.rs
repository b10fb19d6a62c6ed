//! Error types for task graph construction and validation.

use super::NodeId;
use thiserror::Error;

/// Structural errors that make a task graph unusable.
///
/// Any of these aborts a synchronisation run before the tracker is touched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphDomainError {
    /// The node identifier is empty after trimming.
    #[error("task node identifier must not be empty")]
    EmptyNodeId,

    /// The node identifier contains whitespace.
    #[error("invalid task node identifier '{0}', whitespace is not allowed")]
    InvalidNodeId(String),

    /// The node title is empty after trimming.
    #[error("task node {0} has an empty title")]
    EmptyTitle(NodeId),

    /// The content hash is not a lowercase hexadecimal digest.
    #[error("invalid content hash '{0}', expected lowercase hex")]
    InvalidContentHash(String),

    /// Two nodes share the same identifier.
    #[error("duplicate task node identifier: {0}")]
    DuplicateNode(NodeId),

    /// A node references an identifier that is neither in the graph nor
    /// marked external.
    #[error("task node {node} references unknown {relation} {reference}")]
    UnresolvedReference {
        /// Node holding the reference.
        node: NodeId,
        /// Referenced identifier.
        reference: NodeId,
        /// Relation kind (`dependency`, `parent` or `child`).
        relation: &'static str,
    },

    /// Parent and child lists disagree.
    #[error("inconsistent hierarchy between parent {parent} and child {child}")]
    InconsistentHierarchy {
        /// Parent side of the relation.
        parent: NodeId,
        /// Child side of the relation.
        child: NodeId,
    },

    /// The dependency relation contains a cycle.
    #[error("dependency cycle detected: {}", format_cycle(.0))]
    DependencyCycle(Vec<NodeId>),

    /// The referenced node does not exist in the graph.
    #[error("task node {0} not found in graph")]
    NodeNotFound(NodeId),

    /// The producer document could not be decoded.
    #[error("malformed task graph document: {0}")]
    MalformedDocument(String),
}

fn format_cycle(path: &[NodeId]) -> String {
    path.iter()
        .map(NodeId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

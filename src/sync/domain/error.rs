//! Error types for the sync domain.

use crate::graph::domain::NodeId;
use crate::tracker::domain::{ItemId, TrackerDomainError};
use thiserror::Error;

/// Errors raised by sync domain validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncDomainError {
    /// A run identifier could not be parsed.
    #[error("invalid run identifier: {0}")]
    InvalidRunId(String),

    /// The node is already mapped to a different item.
    #[error("node {node} is already mapped to {existing}, refusing {proposed}")]
    NodeAlreadyMapped {
        /// Node being recorded.
        node: NodeId,
        /// Item already on record.
        existing: ItemId,
        /// Item the caller tried to record.
        proposed: ItemId,
    },

    /// The item is already mapped to a different node.
    #[error("item {item} is already mapped to node {existing}, refusing {proposed}")]
    ItemAlreadyMapped {
        /// Item being recorded.
        item: ItemId,
        /// Node already on record.
        existing: NodeId,
        /// Node the caller tried to record.
        proposed: NodeId,
    },

    /// An item body template failed to render.
    #[error("failed to render item body: {0}")]
    Render(String),

    /// A tracker value was invalid.
    #[error(transparent)]
    Tracker(#[from] TrackerDomainError),
}

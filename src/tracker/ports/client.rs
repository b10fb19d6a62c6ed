//! Capability port over the external issue tracker.

use crate::graph::domain::NodeId;
use crate::tracker::domain::{ItemDraft, ItemId, ItemState, ItemUpdate, TrackerItem};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Result type for tracker operations.
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Tracker capability contract.
///
/// Every mutation sets a value to match the caller's authoritative state
/// rather than applying a delta, so repeating a call is harmless.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackerClient: Send + Sync {
    /// Creates an item and returns its tracker-assigned number.
    async fn create_item(&self, draft: &ItemDraft) -> TrackerResult<ItemId>;

    /// Replaces the fields set in `update`.
    async fn update_item(&self, id: ItemId, update: &ItemUpdate) -> TrackerResult<()>;

    /// Applies a label; applying a present label is a no-op.
    async fn add_label(&self, id: ItemId, label: &str) -> TrackerResult<()>;

    /// Removes a label; removing an absent label is a no-op.
    async fn remove_label(&self, id: ItemId, label: &str) -> TrackerResult<()>;

    /// Reads an item. Returns `None` when it no longer exists.
    async fn get_item(&self, id: ItemId) -> TrackerResult<Option<TrackerItem>>;

    /// Reads an item's open/closed state. Returns `None` when it no longer
    /// exists.
    async fn get_item_state(&self, id: ItemId) -> TrackerResult<Option<ItemState>>;

    /// Returns every item whose metadata block names `node_id`, ascending.
    async fn find_items_by_metadata_id(&self, node_id: &NodeId) -> TrackerResult<Vec<ItemId>>;

    /// Returns every item with exactly this title, ascending.
    async fn find_items_by_title(&self, title: &str) -> TrackerResult<Vec<ItemId>>;

    /// Posts a comment.
    async fn comment(&self, id: ItemId, text: &str) -> TrackerResult<()>;

    /// Closes an item.
    async fn close_item(&self, id: ItemId) -> TrackerResult<()>;
}

/// Errors returned by tracker implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrackerError {
    /// The tracker asked the caller to slow down.
    #[error("tracker rate limit exceeded")]
    RateLimited {
        /// Wait requested by the tracker, if it sent one.
        retry_after: Option<Duration>,
    },

    /// A call exceeded its deadline.
    #[error("tracker call timed out after {0:?}")]
    Timeout(Duration),

    /// A failure expected to clear on retry.
    #[error("transient tracker failure: {0}")]
    Transient(String),

    /// The tracker could not be reached at all.
    #[error("tracker unreachable: {0}")]
    Unreachable(String),

    /// Credentials were rejected.
    #[error("tracker rejected credentials: {0}")]
    Unauthorized(String),

    /// The item does not exist.
    #[error("tracker item {0} not found")]
    NotFound(ItemId),

    /// The tracker does not offer the capability.
    #[error("tracker capability unsupported: {0}")]
    Unsupported(String),

    /// The tracker refused the request.
    #[error("tracker rejected request: {0}")]
    Rejected(String),

    /// Every retry attempt failed.
    #[error("tracker call failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts made.
        attempts: u32,
        /// Final error.
        last: Box<TrackerError>,
    },
}

impl TrackerError {
    /// Wraps a transient failure.
    pub fn transient(err: impl ToString) -> Self {
        Self::Transient(err.to_string())
    }

    /// Returns `true` when retrying may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Transient(_) | Self::Unreachable(_)
        )
    }

    /// Returns `true` when the whole run must stop.
    ///
    /// Rejected credentials are fatal immediately; an unreachable tracker is
    /// fatal once retries are exhausted.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Unauthorized(_) => true,
            Self::RetriesExhausted { last, .. } => {
                matches!(**last, Self::Unreachable(_) | Self::Unauthorized(_))
            }
            _ => false,
        }
    }
}

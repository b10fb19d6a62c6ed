//! Native parent/child hierarchy capability.

use crate::tracker::domain::ItemId;
use crate::tracker::ports::TrackerResult;
use async_trait::async_trait;

/// Tracker-native sub-item support.
///
/// Implementations return [`crate::tracker::ports::TrackerError::Unsupported`]
/// when the tracker or repository does not offer sub-items.
#[async_trait]
pub trait NativeHierarchy: Send + Sync {
    /// Attaches `child` beneath `parent`.
    async fn add_child(&self, parent: ItemId, child: ItemId) -> TrackerResult<()>;

    /// Lists the children attached beneath `parent`.
    async fn children(&self, parent: ItemId) -> TrackerResult<Vec<ItemId>>;
}

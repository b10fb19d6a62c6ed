//! Two-tier identity resolution: persisted mapping first, tracker metadata
//! search second.

use crate::graph::domain::TaskNode;
use crate::sync::domain::IdentityMapping;
use crate::tracker::{
    domain::{ItemBody, ItemId, TrackerItem},
    ports::{TrackerClient, TrackerResult},
};
use std::sync::Arc;
use tracing::debug;

/// Where a node's tracker item was found, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The persisted mapping names the item.
    Mapped(TrackerItem),
    /// The mapping had no entry, but an item carries the node's metadata.
    ///
    /// When several do, the lowest-numbered one is returned.
    Recovered(TrackerItem),
    /// The mapping names an item the tracker no longer has.
    Missing(ItemId),
    /// Items with the node's title exist without any metadata block.
    Ambiguous(Vec<ItemId>),
    /// No item exists; one must be created.
    Absent,
}

/// Maps graph nodes to existing tracker items.
#[derive(Debug)]
pub struct IdentityResolver<T>
where
    T: TrackerClient,
{
    tracker: Arc<T>,
}

impl<T> Clone for IdentityResolver<T>
where
    T: TrackerClient,
{
    fn clone(&self) -> Self {
        Self {
            tracker: Arc::clone(&self.tracker),
        }
    }
}

impl<T> IdentityResolver<T>
where
    T: TrackerClient,
{
    /// Creates a resolver over `tracker`.
    #[must_use]
    pub const fn new(tracker: Arc<T>) -> Self {
        Self { tracker }
    }

    /// Resolves a node's tracker item.
    ///
    /// Never invents an item number: every returned item was read back from
    /// the tracker.
    ///
    /// # Errors
    ///
    /// Propagates tracker failures.
    pub async fn resolve(
        &self,
        node: &TaskNode,
        mapping: &IdentityMapping,
    ) -> TrackerResult<Resolution> {
        if let Some(id) = mapping.item_for(node.id()) {
            return Ok(self
                .tracker
                .get_item(id)
                .await?
                .map_or(Resolution::Missing(id), Resolution::Mapped));
        }

        if let Some(item) = self.recover(node).await? {
            debug!(node_id = %node.id(), item = %item.id, "recovered identity from metadata");
            return Ok(Resolution::Recovered(item));
        }

        let candidates = self.untracked_same_title(node.title()).await?;
        if candidates.is_empty() {
            Ok(Resolution::Absent)
        } else {
            Ok(Resolution::Ambiguous(candidates))
        }
    }

    /// Returns the canonical item carrying the node's metadata.
    async fn recover(&self, node: &TaskNode) -> TrackerResult<Option<TrackerItem>> {
        let candidates = self.tracker.find_items_by_metadata_id(node.id()).await?;
        match candidates.into_iter().min() {
            Some(canonical) => self.tracker.get_item(canonical).await,
            None => Ok(None),
        }
    }

    /// Returns same-titled items that were not written by the engine.
    async fn untracked_same_title(&self, title: &str) -> TrackerResult<Vec<ItemId>> {
        let mut untracked = Vec::new();
        for id in self.tracker.find_items_by_title(title).await? {
            let Some(item) = self.tracker.get_item(id).await? else {
                continue;
            };
            let has_metadata = ItemBody::parse(&item.body)
                .map(|body| body.metadata().is_some())
                .unwrap_or(true);
            if !has_metadata {
                untracked.push(id);
            }
        }
        Ok(untracked)
    }
}

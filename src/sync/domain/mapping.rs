//! Durable node-to-item identity mapping.

use super::SyncDomainError;
use crate::graph::domain::NodeId;
use crate::tracker::domain::ItemId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One persisted mapping entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    /// Graph node identifier.
    pub node_id: NodeId,
    /// Tracker item materializing the node.
    pub item_id: ItemId,
}

/// Bidirectional association between graph nodes and tracker items.
///
/// Entries are write-once: recording a different item for a mapped node, or
/// a different node for a mapped item, is refused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<MappingEntry>", into = "Vec<MappingEntry>")]
pub struct IdentityMapping {
    by_node: BTreeMap<NodeId, ItemId>,
    by_item: BTreeMap<ItemId, NodeId>,
}

impl IdentityMapping {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the item mapped to `node`.
    #[must_use]
    pub fn item_for(&self, node: &NodeId) -> Option<ItemId> {
        self.by_node.get(node).copied()
    }

    /// Returns the node mapped to `item`.
    #[must_use]
    pub fn node_for(&self, item: ItemId) -> Option<&NodeId> {
        self.by_item.get(&item)
    }

    /// Records an association.
    ///
    /// Returns `true` when the entry is new and `false` when the identical
    /// entry already existed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncDomainError::NodeAlreadyMapped`] or
    /// [`SyncDomainError::ItemAlreadyMapped`] when either side is already
    /// associated with something else.
    pub fn record(&mut self, node: NodeId, item: ItemId) -> Result<bool, SyncDomainError> {
        if let Some(&existing) = self.by_node.get(&node) {
            if existing == item {
                return Ok(false);
            }
            return Err(SyncDomainError::NodeAlreadyMapped {
                node,
                existing,
                proposed: item,
            });
        }
        if let Some(existing) = self.by_item.get(&item) {
            return Err(SyncDomainError::ItemAlreadyMapped {
                item,
                existing: existing.clone(),
                proposed: node,
            });
        }
        self.by_item.insert(item, node.clone());
        self.by_node.insert(node, item);
        Ok(true)
    }

    /// Copies every entry of `other` that does not conflict with this
    /// mapping. Returns the number of entries added.
    pub fn absorb(&mut self, other: &Self) -> usize {
        let mut added = 0;
        for entry in other.entries() {
            if matches!(self.record(entry.node_id, entry.item_id), Ok(true)) {
                added += 1;
            }
        }
        added
    }

    /// Returns entries ordered by node identifier.
    pub fn entries(&self) -> impl Iterator<Item = MappingEntry> + '_ {
        self.by_node.iter().map(|(node_id, item_id)| MappingEntry {
            node_id: node_id.clone(),
            item_id: *item_id,
        })
    }

    /// Returns the number of mapped nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_node.len()
    }

    /// Returns `true` when nothing is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }
}

impl TryFrom<Vec<MappingEntry>> for IdentityMapping {
    type Error = SyncDomainError;

    fn try_from(entries: Vec<MappingEntry>) -> Result<Self, Self::Error> {
        let mut mapping = Self::new();
        for entry in entries {
            mapping.record(entry.node_id, entry.item_id)?;
        }
        Ok(mapping)
    }
}

impl From<IdentityMapping> for Vec<MappingEntry> {
    fn from(mapping: IdentityMapping) -> Self {
        mapping.entries().collect()
    }
}

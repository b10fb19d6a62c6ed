//! In-memory tracker adapter for tests and dry runs.

use crate::graph::domain::NodeId;
use crate::tracker::{
    domain::{ItemBody, ItemDraft, ItemId, ItemState, ItemUpdate, TrackerItem},
    ports::{NativeHierarchy, TrackerClient, TrackerError, TrackerResult},
};
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory tracker.
///
/// Items are numbered from 1 in creation order. Every call yields to the
/// runtime first, so concurrent runs interleave between calls the way they
/// would against a real tracker. Failures can be injected for the next calls
/// and every mutating call is counted.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTracker {
    state: Arc<RwLock<InMemoryTrackerState>>,
}

#[derive(Debug, Default)]
struct InMemoryTrackerState {
    items: BTreeMap<ItemId, TrackerItem>,
    next_id: u64,
    faults: VecDeque<TrackerError>,
    native_hierarchy: bool,
    sub_items: BTreeMap<ItemId, Vec<ItemId>>,
    mutations: usize,
    comments: BTreeMap<ItemId, Vec<String>>,
    outage: Option<(usize, TrackerError)>,
}

fn lock_error(err: impl ToString) -> TrackerError {
    TrackerError::transient(format!("tracker state lock poisoned: {}", err.to_string()))
}

impl InMemoryTracker {
    /// Creates an empty tracker without native hierarchy support.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty tracker that supports native sub-items.
    #[must_use]
    pub fn with_native_hierarchy() -> Self {
        let tracker = Self::default();
        if let Ok(mut state) = tracker.state.write() {
            state.native_hierarchy = true;
        }
        tracker
    }

    /// Queues errors returned, in order, by the next calls of any kind.
    ///
    /// # Errors
    ///
    /// Returns a transient error when lock acquisition fails.
    pub fn inject_failures(&self, errors: impl IntoIterator<Item = TrackerError>) -> TrackerResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.faults.extend(errors);
        Ok(())
    }

    /// Fails every call with `error` once `mutations` mutating calls have
    /// been served, until [`InMemoryTracker::restore`] is called.
    ///
    /// # Errors
    ///
    /// Returns a transient error when lock acquisition fails.
    pub fn fail_after_mutations(&self, mutations: usize, error: TrackerError) -> TrackerResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.outage = Some((mutations, error));
        Ok(())
    }

    /// Ends an outage started by [`InMemoryTracker::fail_after_mutations`].
    ///
    /// # Errors
    ///
    /// Returns a transient error when lock acquisition fails.
    pub fn restore(&self) -> TrackerResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.outage = None;
        Ok(())
    }

    /// Sets an item's state as if a person had opened or closed it.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::NotFound`] for unknown items.
    pub fn set_state(&self, id: ItemId, item_state: ItemState) -> TrackerResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        let item = state.items.get_mut(&id).ok_or(TrackerError::NotFound(id))?;
        item.state = item_state;
        Ok(())
    }

    /// Seeds an item directly, bypassing mutation counting.
    ///
    /// # Errors
    ///
    /// Returns a transient error when lock acquisition fails.
    pub fn seed_item(&self, draft: &ItemDraft) -> TrackerResult<ItemId> {
        let mut state = self.state.write().map_err(lock_error)?;
        insert_item(&mut state, draft)
    }

    /// Deletes an item as if an operator had removed it.
    ///
    /// # Errors
    ///
    /// Returns a transient error when lock acquisition fails.
    pub fn delete_item(&self, id: ItemId) -> TrackerResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.items.remove(&id);
        Ok(())
    }

    /// Returns every item, ascending by number.
    #[must_use]
    pub fn items(&self) -> Vec<TrackerItem> {
        self.state
            .read()
            .map(|state| state.items.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the item with the given number.
    #[must_use]
    pub fn item(&self, id: ItemId) -> Option<TrackerItem> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.items.get(&id).cloned())
    }

    /// Returns the number of mutating calls served so far.
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.state.read().map(|state| state.mutations).unwrap_or(0)
    }

    /// Returns comments posted on an item.
    #[must_use]
    pub fn comments(&self, id: ItemId) -> Vec<String> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.comments.get(&id).cloned())
            .unwrap_or_default()
    }

    async fn enter(&self) -> TrackerResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.state.write().map_err(lock_error)?;
        if let Some((limit, error)) = &state.outage
            && state.mutations >= *limit
        {
            return Err(error.clone());
        }
        state.faults.pop_front().map_or(Ok(()), Err)
    }

    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut InMemoryTrackerState) -> TrackerResult<T> + Send,
    ) -> TrackerResult<T> {
        self.enter().await?;
        let mut state = self.state.write().map_err(lock_error)?;
        let result = f(&mut state)?;
        state.mutations += 1;
        Ok(result)
    }

    async fn read<T>(
        &self,
        f: impl FnOnce(&InMemoryTrackerState) -> TrackerResult<T> + Send,
    ) -> TrackerResult<T> {
        self.enter().await?;
        let state = self.state.read().map_err(lock_error)?;
        f(&state)
    }
}

fn insert_item(state: &mut InMemoryTrackerState, draft: &ItemDraft) -> TrackerResult<ItemId> {
    state.next_id += 1;
    let id = ItemId::new(state.next_id).map_err(TrackerError::transient)?;
    state.items.insert(
        id,
        TrackerItem {
            id,
            title: draft.title().to_owned(),
            body: draft.body().to_owned(),
            labels: draft.labels().clone(),
            state: ItemState::Open,
        },
    );
    Ok(id)
}

fn item_mut(state: &mut InMemoryTrackerState, id: ItemId) -> TrackerResult<&mut TrackerItem> {
    state.items.get_mut(&id).ok_or(TrackerError::NotFound(id))
}

#[async_trait]
impl TrackerClient for InMemoryTracker {
    async fn create_item(&self, draft: &ItemDraft) -> TrackerResult<ItemId> {
        self.mutate(|state| insert_item(state, draft)).await
    }

    async fn update_item(&self, id: ItemId, update: &ItemUpdate) -> TrackerResult<()> {
        self.mutate(|state| {
            let item = item_mut(state, id)?;
            if let Some(title) = &update.title {
                title.clone_into(&mut item.title);
            }
            if let Some(body) = &update.body {
                body.clone_into(&mut item.body);
            }
            if let Some(labels) = &update.labels {
                labels.clone_into(&mut item.labels);
            }
            Ok(())
        })
        .await
    }

    async fn add_label(&self, id: ItemId, label: &str) -> TrackerResult<()> {
        self.mutate(|state| {
            item_mut(state, id)?.labels.insert(label.to_owned());
            Ok(())
        })
        .await
    }

    async fn remove_label(&self, id: ItemId, label: &str) -> TrackerResult<()> {
        self.mutate(|state| {
            item_mut(state, id)?.labels.remove(label);
            Ok(())
        })
        .await
    }

    async fn get_item(&self, id: ItemId) -> TrackerResult<Option<TrackerItem>> {
        self.read(|state| Ok(state.items.get(&id).cloned())).await
    }

    async fn get_item_state(&self, id: ItemId) -> TrackerResult<Option<ItemState>> {
        self.read(|state| Ok(state.items.get(&id).map(|item| item.state)))
            .await
    }

    async fn find_items_by_metadata_id(&self, node_id: &NodeId) -> TrackerResult<Vec<ItemId>> {
        self.read(|state| {
            Ok(state
                .items
                .values()
                .filter(|item| {
                    ItemBody::parse(&item.body)
                        .ok()
                        .and_then(|body| body.metadata().map(|meta| meta.node_id == *node_id))
                        .unwrap_or(false)
                })
                .map(|item| item.id)
                .collect())
        })
        .await
    }

    async fn find_items_by_title(&self, title: &str) -> TrackerResult<Vec<ItemId>> {
        self.read(|state| {
            Ok(state
                .items
                .values()
                .filter(|item| item.title == title)
                .map(|item| item.id)
                .collect())
        })
        .await
    }

    async fn comment(&self, id: ItemId, text: &str) -> TrackerResult<()> {
        self.mutate(|state| {
            item_mut(state, id)?;
            state.comments.entry(id).or_default().push(text.to_owned());
            Ok(())
        })
        .await
    }

    async fn close_item(&self, id: ItemId) -> TrackerResult<()> {
        self.mutate(|state| {
            item_mut(state, id)?.state = ItemState::Closed;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl NativeHierarchy for InMemoryTracker {
    async fn add_child(&self, parent: ItemId, child: ItemId) -> TrackerResult<()> {
        self.mutate(|state| {
            if !state.native_hierarchy {
                return Err(TrackerError::Unsupported("sub-items".to_owned()));
            }
            item_mut(state, parent)?;
            item_mut(state, child)?;
            let children = state.sub_items.entry(parent).or_default();
            if !children.contains(&child) {
                children.push(child);
            }
            Ok(())
        })
        .await
    }

    async fn children(&self, parent: ItemId) -> TrackerResult<Vec<ItemId>> {
        self.read(|state| {
            if !state.native_hierarchy {
                return Err(TrackerError::Unsupported("sub-items".to_owned()));
            }
            Ok(state.sub_items.get(&parent).cloned().unwrap_or_default())
        })
        .await
    }
}

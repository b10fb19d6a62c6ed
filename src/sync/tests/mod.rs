//! Unit tests for the sync module.
//!
//! Services are exercised end to end against the in-memory tracker and
//! snapshot store.

mod concurrency_tests;
mod reconciler_tests;

use crate::graph::domain::{ContentHash, GraphMetadata, NodeId, TaskGraph, TaskNode};
use crate::sync::{
    adapters::InMemorySnapshotStore,
    domain::{HierarchyMode, SyncConfig},
    services::{HierarchyLinker, SyncEngine},
};
use crate::tracker::{
    adapters::InMemoryTracker,
    domain::{ItemBody, ItemDraft, ItemId, ItemState, ItemUpdate, TrackerItem},
    ports::{NativeHierarchy, TrackerClient, TrackerError, TrackerResult},
};
use async_trait::async_trait;
use mockable::DefaultClock;
use std::collections::BTreeSet;
use std::sync::Arc;

pub(super) type TestEngine = SyncEngine<InMemoryTracker, InMemorySnapshotStore, DefaultClock>;

pub(super) fn node_id(value: &str) -> NodeId {
    NodeId::new(value).expect("valid node id")
}

pub(super) fn node(id: &str, title: &str) -> TaskNode {
    TaskNode::new(node_id(id), title)
        .expect("valid node")
        .with_description(format!("Work for {title}."))
}

pub(super) fn graph_from(document: &str, nodes: impl IntoIterator<Item = TaskNode>) -> TaskGraph {
    graph_at("docs/prd.md", document, nodes)
}

pub(super) fn graph_at(
    source_path: &str,
    document: &str,
    nodes: impl IntoIterator<Item = TaskNode>,
) -> TaskGraph {
    let metadata = GraphMetadata {
        source_path: source_path.to_owned(),
        content_hash: ContentHash::of(document.as_bytes()),
        generated_at: None,
        complexity_threshold: 5,
        max_depth: 2,
    };
    let mut graph = TaskGraph::new("1.0", metadata);
    for task in nodes {
        graph.push_node(task);
    }
    graph
}

/// Four nodes: a setup task, and a parser epic with two chained subtasks.
///
/// `2` depends on `1`; `2.2` depends on `2.1`.
pub(super) fn sample_nodes() -> Vec<TaskNode> {
    vec![
        node("1", "Set up repository").with_complexity(2),
        node("2", "Build parser")
            .with_complexity(8)
            .with_dependencies([node_id("1")])
            .with_children([node_id("2.1"), node_id("2.2")]),
        node("2.1", "Tokenizer")
            .with_complexity(3)
            .with_parent(node_id("2")),
        node("2.2", "Grammar")
            .with_complexity(5)
            .with_parent(node_id("2"))
            .with_dependencies([node_id("2.1")]),
    ]
}

pub(super) fn sample_graph() -> TaskGraph {
    graph_from("# Parser PRD", sample_nodes())
}

pub(super) fn engine_with(
    tracker: &Arc<InMemoryTracker>,
    store: &Arc<InMemorySnapshotStore>,
    mode: HierarchyMode,
) -> TestEngine {
    engine_over(tracker, store, mode)
}

pub(super) fn engine_over<T>(
    tracker: &Arc<T>,
    store: &Arc<InMemorySnapshotStore>,
    mode: HierarchyMode,
) -> SyncEngine<T, InMemorySnapshotStore, DefaultClock>
where
    T: TrackerClient + NativeHierarchy + 'static,
{
    let config = SyncConfig {
        hierarchy: mode,
        ..SyncConfig::default()
    };
    let linker = HierarchyLinker::for_mode(mode, tracker);
    SyncEngine::new(
        Arc::clone(tracker),
        Arc::clone(store),
        Arc::new(DefaultClock),
        &config,
        linker,
    )
}

/// Tracker, snapshot store and an engine in the default hierarchy mode.
pub(super) struct Harness {
    pub(super) tracker: Arc<InMemoryTracker>,
    pub(super) store: Arc<InMemorySnapshotStore>,
    pub(super) engine: TestEngine,
}

impl Harness {
    pub(super) fn new(inner: InMemoryTracker) -> Self {
        let tracker = Arc::new(inner);
        let store = Arc::new(InMemorySnapshotStore::new());
        let engine = engine_with(&tracker, &store, HierarchyMode::Native);
        Self {
            tracker,
            store,
            engine,
        }
    }

    /// Items whose metadata block names `node`, ascending.
    pub(super) fn items_for(&self, node: &str) -> Vec<TrackerItem> {
        let wanted = node_id(node);
        self.tracker
            .items()
            .into_iter()
            .filter(|item| {
                ItemBody::parse(&item.body)
                    .ok()
                    .and_then(|body| body.metadata().map(|meta| meta.node_id == wanted))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// The single open item for `node`.
    pub(super) fn open_item(&self, node: &str) -> TrackerItem {
        let open: Vec<TrackerItem> = self
            .items_for(node)
            .into_iter()
            .filter(|item| item.state == ItemState::Open)
            .collect();
        assert_eq!(open.len(), 1, "node {node} should have one open item");
        open.into_iter().next().expect("one open item")
    }
}

/// In-memory tracker whose state reads and metadata search can be degraded.
pub(super) struct DegradedTracker {
    inner: Arc<InMemoryTracker>,
    unreadable_states: BTreeSet<ItemId>,
    blind_metadata_search: bool,
}

impl DegradedTracker {
    pub(super) fn over(inner: &Arc<InMemoryTracker>) -> Self {
        Self {
            inner: Arc::clone(inner),
            unreadable_states: BTreeSet::new(),
            blind_metadata_search: false,
        }
    }

    /// State reads for `item` keep failing transiently.
    pub(super) fn with_unreadable_state(mut self, item: ItemId) -> Self {
        self.unreadable_states.insert(item);
        self
    }

    /// Metadata search finds nothing, as when the search index lags.
    pub(super) fn with_blind_metadata_search(mut self) -> Self {
        self.blind_metadata_search = true;
        self
    }
}

#[async_trait]
impl TrackerClient for DegradedTracker {
    async fn create_item(&self, draft: &ItemDraft) -> TrackerResult<ItemId> {
        self.inner.create_item(draft).await
    }

    async fn update_item(&self, id: ItemId, update: &ItemUpdate) -> TrackerResult<()> {
        self.inner.update_item(id, update).await
    }

    async fn add_label(&self, id: ItemId, label: &str) -> TrackerResult<()> {
        self.inner.add_label(id, label).await
    }

    async fn remove_label(&self, id: ItemId, label: &str) -> TrackerResult<()> {
        self.inner.remove_label(id, label).await
    }

    async fn get_item(&self, id: ItemId) -> TrackerResult<Option<TrackerItem>> {
        self.inner.get_item(id).await
    }

    async fn get_item_state(&self, id: ItemId) -> TrackerResult<Option<ItemState>> {
        if self.unreadable_states.contains(&id) {
            return Err(TrackerError::RetriesExhausted {
                attempts: 3,
                last: Box::new(TrackerError::transient("502 bad gateway")),
            });
        }
        self.inner.get_item_state(id).await
    }

    async fn find_items_by_metadata_id(&self, node_id: &NodeId) -> TrackerResult<Vec<ItemId>> {
        if self.blind_metadata_search {
            return Ok(Vec::new());
        }
        self.inner.find_items_by_metadata_id(node_id).await
    }

    async fn find_items_by_title(&self, title: &str) -> TrackerResult<Vec<ItemId>> {
        self.inner.find_items_by_title(title).await
    }

    async fn comment(&self, id: ItemId, text: &str) -> TrackerResult<()> {
        self.inner.comment(id, text).await
    }

    async fn close_item(&self, id: ItemId) -> TrackerResult<()> {
        self.inner.close_item(id).await
    }
}

#[async_trait]
impl NativeHierarchy for DegradedTracker {
    async fn add_child(&self, parent: ItemId, child: ItemId) -> TrackerResult<()> {
        self.inner.add_child(parent, child).await
    }

    async fn children(&self, parent: ItemId) -> TrackerResult<Vec<ItemId>> {
        self.inner.children(parent).await
    }
}

//! Unit tests for the graph module.


use crate::graph::domain::{ContentHash, GraphMetadata, NodeId, TaskGraph, TaskNode};

pub(super) fn node_id(value: &str) -> NodeId {
    NodeId::new(value).expect("valid node id")
}

pub(super) fn metadata() -> GraphMetadata {
    GraphMetadata {
        source_path: "docs/prd.md".to_owned(),
        content_hash: ContentHash::of(b"# Product requirements"),
        generated_at: None,
        complexity_threshold: 5,
        max_depth: 2,
    }
}

pub(super) fn node(id: &str, title: &str) -> TaskNode {
    TaskNode::new(node_id(id), title).expect("valid node")
}

pub(super) fn graph_of(nodes: impl IntoIterator<Item = TaskNode>) -> TaskGraph {
    let mut graph = TaskGraph::new("1.0", metadata());
    for task in nodes {
        graph.push_node(task);
    }
    graph
}

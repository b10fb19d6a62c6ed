//! Decoding of the graph producer's JSON output.
//!
//! The producer emits nested tasks with `subtasks[]`. Decoding flattens them
//! into graph order (parent before its subtasks) and wires `parent` and
//! `children` on both sides. Subtask identifiers and sibling dependencies that
//! are not already dotted are qualified beneath their parent, so subtask `2`
//! of task `3` becomes `3.2`.

use super::{
    ContentHash, GraphDomainError, GraphMetadata, NodeId, Priority, SubGraph, TaskGraph, TaskNode,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;

/// Default graph format version when the producer omits it.
pub const DEFAULT_GRAPH_VERSION: &str = "1.0";

#[derive(Debug, Deserialize)]
struct ProducerDocument {
    #[serde(default)]
    version: Option<String>,
    metadata: ProducerMetadata,
    tasks: Vec<ProducerTask>,
}

#[derive(Debug, Deserialize)]
struct ProducerMetadata {
    prd_path: String,
    #[serde(default)]
    generated_at: Option<DateTime<Utc>>,
    complexity_threshold: u32,
    max_depth: u32,
}

#[derive(Debug, Deserialize)]
struct ProducerTaskList {
    tasks: Vec<ProducerTask>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProducerTask {
    id: RawId,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    details: Option<String>,
    #[serde(default, alias = "test_strategy")]
    test_strategy: Option<String>,
    #[serde(default)]
    complexity: Option<u32>,
    #[serde(default)]
    priority: Option<Priority>,
    #[serde(default)]
    dependencies: Vec<RawId>,
    #[serde(default)]
    subtasks: Vec<ProducerTask>,
}

/// Producers emit numeric or string identifiers interchangeably.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl RawId {
    fn to_node_id(&self) -> Result<NodeId, GraphDomainError> {
        match self {
            Self::Number(value) => NodeId::new(value.to_string()),
            Self::Text(value) => NodeId::new(value.as_str()),
        }
    }
}

/// Decodes a full producer document into a task graph.
///
/// The graph is not validated; callers run [`TaskGraph::validate`] before
/// acting on it.
///
/// # Errors
///
/// Returns [`GraphDomainError::MalformedDocument`] for invalid JSON or a
/// node-level error for invalid identifiers or titles.
pub fn decode_graph(json: &str, content_hash: ContentHash) -> Result<TaskGraph, GraphDomainError> {
    let document: ProducerDocument = serde_json::from_str(json)
        .map_err(|err| GraphDomainError::MalformedDocument(err.to_string()))?;
    let metadata = GraphMetadata {
        source_path: document.metadata.prd_path,
        content_hash,
        generated_at: document.metadata.generated_at,
        complexity_threshold: document.metadata.complexity_threshold,
        max_depth: document.metadata.max_depth,
    };
    let version = document
        .version
        .unwrap_or_else(|| DEFAULT_GRAPH_VERSION.to_owned());
    let mut graph = TaskGraph::new(version, metadata);
    for node in flatten(document.tasks, None)? {
        graph.push_node(node);
    }
    Ok(graph)
}

/// Decodes a breakdown response (`{"tasks": [...]}`) generated beneath `root`.
///
/// Top-level tasks become children of `root`; their identifiers are qualified
/// beneath it.
///
/// # Errors
///
/// Returns [`GraphDomainError::MalformedDocument`] for invalid JSON or a
/// node-level error for invalid identifiers or titles.
pub fn decode_sub_graph(json: &str, root: &NodeId) -> Result<SubGraph, GraphDomainError> {
    let list: ProducerTaskList = serde_json::from_str(json)
        .map_err(|err| GraphDomainError::MalformedDocument(err.to_string()))?;
    Ok(SubGraph {
        root: root.clone(),
        nodes: flatten(list.tasks, Some(root))?,
    })
}

fn flatten(
    tasks: Vec<ProducerTask>,
    parent: Option<&NodeId>,
) -> Result<Vec<TaskNode>, GraphDomainError> {
    let qualify = |raw: &RawId| -> Result<NodeId, GraphDomainError> {
        let id = raw.to_node_id()?;
        Ok(parent.map_or_else(|| id.clone(), |parent_id| id.qualified_under(parent_id)))
    };

    let siblings: HashSet<NodeId> = tasks
        .iter()
        .map(|task| qualify(&task.id))
        .collect::<Result<_, _>>()?;

    let mut nodes = Vec::new();
    for task in tasks {
        let id = qualify(&task.id)?;
        let dependencies = task
            .dependencies
            .iter()
            .map(|raw| {
                let candidate = qualify(raw)?;
                if siblings.contains(&candidate) {
                    Ok(candidate)
                } else {
                    raw.to_node_id()
                }
            })
            .collect::<Result<Vec<_>, GraphDomainError>>()?;

        let subtasks = flatten(task.subtasks, Some(&id))?;
        let children: Vec<NodeId> = subtasks
            .iter()
            .filter(|node| node.parent() == Some(&id))
            .map(|node| node.id().clone())
            .collect();

        let mut node = TaskNode::new(id, task.title)?
            .with_description(task.description)
            .with_complexity(task.complexity.unwrap_or_default())
            .with_priority(task.priority.unwrap_or_default())
            .with_dependencies(dependencies)
            .with_children(children);
        if let Some(details) = task.details {
            node = node.with_details(details);
        }
        if let Some(test_strategy) = task.test_strategy {
            node = node.with_test_strategy(test_strategy);
        }
        if let Some(parent_id) = parent {
            node = node.with_parent(parent_id.clone());
        }
        nodes.push(node);
        nodes.extend(subtasks);
    }
    Ok(nodes)
}

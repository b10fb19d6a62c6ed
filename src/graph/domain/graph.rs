//! Task graph aggregate, structural validation, and breakdown merging.

use super::{ContentHash, Expansion, GraphDomainError, NodeId, TaskNode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Provenance of a task graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphMetadata {
    /// Path of the requirements document the graph was produced from.
    pub source_path: String,
    /// Digest of the requirements document contents.
    pub content_hash: ContentHash,
    /// When the producer generated the graph, if reported.
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
    /// Complexity threshold the producer was invoked with.
    pub complexity_threshold: u32,
    /// Maximum depth the producer was invoked with.
    pub max_depth: u32,
}

/// Ordered set of task nodes plus provenance.
///
/// Node order is insertion order and is the stable processing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskGraph {
    version: String,
    metadata: GraphMetadata,
    nodes: Vec<TaskNode>,
    #[serde(default)]
    external: BTreeSet<NodeId>,
}

/// Bounded sub-graph generated beneath one existing node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubGraph {
    /// Node the sub-graph hangs from.
    pub root: NodeId,
    /// Generated nodes in processing order.
    pub nodes: Vec<TaskNode>,
}

impl SubGraph {
    /// Creates an empty sub-graph rooted at `root`.
    #[must_use]
    pub const fn empty(root: NodeId) -> Self {
        Self {
            root,
            nodes: Vec::new(),
        }
    }

    /// Returns `true` when nothing was generated.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the generated node identifiers.
    #[must_use]
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|node| node.id().clone()).collect()
    }

    /// Returns each generated node's depth below the root.
    ///
    /// Direct children of the root have depth 1. Nodes whose parent chain
    /// never reaches the root are reported at depth 1.
    #[must_use]
    pub fn depths(&self) -> HashMap<NodeId, u32> {
        let parents: HashMap<&NodeId, Option<&NodeId>> = self
            .nodes
            .iter()
            .map(|node| (node.id(), node.parent()))
            .collect();
        self.nodes
            .iter()
            .map(|node| {
                let mut depth = 1;
                let mut cursor = node.parent();
                while let Some(parent) = cursor {
                    if *parent == self.root || depth > parents.len() {
                        break;
                    }
                    depth += 1;
                    cursor = parents.get(parent).copied().flatten();
                }
                (node.id().clone(), u32::try_from(depth).unwrap_or(u32::MAX))
            })
            .collect()
    }
}

impl TaskGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new(version: impl Into<String>, metadata: GraphMetadata) -> Self {
        Self {
            version: version.into(),
            metadata,
            nodes: Vec::new(),
            external: BTreeSet::new(),
        }
    }

    /// Appends a node in processing order.
    ///
    /// Uniqueness is checked by [`TaskGraph::validate`].
    pub fn push_node(&mut self, node: TaskNode) {
        self.nodes.push(node);
    }

    /// Marks an identifier as living outside this graph.
    pub fn mark_external(&mut self, id: NodeId) {
        self.external.insert(id);
    }

    /// Returns the graph format version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns graph provenance.
    #[must_use]
    pub const fn metadata(&self) -> &GraphMetadata {
        &self.metadata
    }

    /// Returns nodes in processing order.
    #[must_use]
    pub fn nodes(&self) -> &[TaskNode] {
        &self.nodes
    }

    /// Looks up a node by identifier.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&TaskNode> {
        self.nodes.iter().find(|node| node.id() == id)
    }

    /// Returns `true` when the identifier is declared external.
    #[must_use]
    pub fn is_external(&self, id: &NodeId) -> bool {
        self.external.contains(id)
    }

    /// Returns nodes that list `id` as a dependency, in processing order.
    #[must_use]
    pub fn dependents_of(&self, id: &NodeId) -> Vec<&TaskNode> {
        self.nodes
            .iter()
            .filter(|node| node.dependencies().contains(id))
            .collect()
    }

    /// Checks every structural invariant of the graph.
    ///
    /// # Errors
    ///
    /// Returns the first [`GraphDomainError`] found: duplicate identifiers,
    /// unresolved references, inconsistent parent/child lists, or a
    /// dependency cycle.
    pub fn validate(&self) -> Result<(), GraphDomainError> {
        let index = self.index()?;
        self.check_references(&index)?;
        self.check_hierarchy(&index)?;
        self.check_acyclic(&index)
    }

    fn index(&self) -> Result<HashMap<&NodeId, &TaskNode>, GraphDomainError> {
        let mut index = HashMap::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if index.insert(node.id(), node).is_some() {
                return Err(GraphDomainError::DuplicateNode(node.id().clone()));
            }
        }
        Ok(index)
    }

    fn check_references(
        &self,
        index: &HashMap<&NodeId, &TaskNode>,
    ) -> Result<(), GraphDomainError> {
        let resolves = |id: &NodeId| index.contains_key(id) || self.external.contains(id);
        for node in &self.nodes {
            let references = node
                .dependencies()
                .iter()
                .map(|id| (id, "dependency"))
                .chain(node.parent().map(|id| (id, "parent")))
                .chain(node.children().iter().map(|id| (id, "child")));
            for (reference, relation) in references {
                if !resolves(reference) {
                    return Err(GraphDomainError::UnresolvedReference {
                        node: node.id().clone(),
                        reference: reference.clone(),
                        relation,
                    });
                }
            }
        }
        Ok(())
    }

    fn check_hierarchy(&self, index: &HashMap<&NodeId, &TaskNode>) -> Result<(), GraphDomainError> {
        for node in &self.nodes {
            if let Some(parent_id) = node.parent()
                && let Some(parent) = index.get(parent_id)
            {
                let listed = parent
                    .children()
                    .iter()
                    .filter(|child| *child == node.id())
                    .count();
                if listed != 1 {
                    return Err(GraphDomainError::InconsistentHierarchy {
                        parent: parent_id.clone(),
                        child: node.id().clone(),
                    });
                }
            }
            for child_id in node.children() {
                let Some(child) = index.get(child_id) else {
                    continue;
                };
                if child.parent() != Some(node.id()) {
                    return Err(GraphDomainError::InconsistentHierarchy {
                        parent: node.id().clone(),
                        child: child_id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_acyclic(&self, index: &HashMap<&NodeId, &TaskNode>) -> Result<(), GraphDomainError> {
        let mut finished: HashSet<&NodeId> = HashSet::new();
        for node in &self.nodes {
            let mut path = Vec::new();
            visit(node.id(), index, &mut path, &mut finished)?;
        }
        Ok(())
    }

    /// Merges a breakdown sub-graph beneath its root node.
    ///
    /// Generated nodes without a parent are attached to the root and appended
    /// to its children. Nodes whose identifier already exists as an earlier
    /// expansion product are refreshed in place. The root is marked expanded.
    /// Returns the identifiers of every merged node.
    ///
    /// # Errors
    ///
    /// Returns [`GraphDomainError::NodeNotFound`] if the root is missing, or
    /// [`GraphDomainError::DuplicateNode`] if a generated identifier collides
    /// with a node outside the root's previous expansion.
    pub fn merge_expansion(
        &mut self,
        sub_graph: SubGraph,
        depth_limit: u32,
        complexity_threshold: u32,
    ) -> Result<Vec<NodeId>, GraphDomainError> {
        let root_id = sub_graph.root;
        let previous: BTreeSet<NodeId> = self
            .node(&root_id)
            .ok_or_else(|| GraphDomainError::NodeNotFound(root_id.clone()))?
            .expansion()
            .map(|expansion| expansion.produced.iter().cloned().collect())
            .unwrap_or_default();

        let mut merged = Vec::with_capacity(sub_graph.nodes.len());
        for mut generated in sub_graph.nodes {
            let attaches_to_root = generated.parent().is_none_or(|parent| *parent == root_id);
            if attaches_to_root {
                generated.set_parent(root_id.clone());
            }
            let id = generated.id().clone();
            let position = self.nodes.iter().position(|node| *node.id() == id);
            match position {
                Some(index) if previous.contains(&id) => {
                    if let Some(existing) = self.nodes.get_mut(index) {
                        existing.refresh_from(generated);
                    }
                }
                Some(_) => return Err(GraphDomainError::DuplicateNode(id)),
                None => self.nodes.push(generated),
            }
            if attaches_to_root && let Some(root) = self.node_mut(&root_id) {
                root.push_child(id.clone());
            }
            merged.push(id);
        }

        if let Some(root) = self.node_mut(&root_id) {
            root.set_expansion(Expansion {
                depth_limit,
                complexity_threshold,
                produced: merged.clone(),
            });
        }
        Ok(merged)
    }

    fn node_mut(&mut self, id: &NodeId) -> Option<&mut TaskNode> {
        self.nodes.iter_mut().find(|node| node.id() == id)
    }
}

/// Depth-first search over dependency edges; `path` holds the grey nodes.
fn visit<'a>(
    id: &'a NodeId,
    index: &HashMap<&'a NodeId, &'a TaskNode>,
    path: &mut Vec<&'a NodeId>,
    finished: &mut HashSet<&'a NodeId>,
) -> Result<(), GraphDomainError> {
    if finished.contains(id) {
        return Ok(());
    }
    if let Some(start) = path.iter().position(|grey| *grey == id) {
        let mut cycle: Vec<NodeId> = path.iter().skip(start).map(|&n| n.clone()).collect();
        cycle.push(id.clone());
        return Err(GraphDomainError::DependencyCycle(cycle));
    }
    // External dependencies have no outgoing edges inside this graph.
    let Some(&node) = index.get(id) else {
        finished.insert(id);
        return Ok(());
    };
    path.push(id);
    for dependency in node.dependencies() {
        visit(dependency, index, path, finished)?;
    }
    path.pop();
    finished.insert(id);
    Ok(())
}

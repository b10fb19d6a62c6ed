//! Task node value type.

use super::{GraphDomainError, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Planner-assigned priority of a task node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Must be done first.
    High,
    /// Default priority.
    #[default]
    Medium,
    /// Can wait.
    Low,
}

impl Priority {
    /// Returns the canonical lowercase representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Arguments a node was expanded with by a manual breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expansion {
    /// Maximum depth of the generated sub-graph below the node.
    pub depth_limit: u32,
    /// Complexity at or below which generated leaves stop splitting.
    pub complexity_threshold: u32,
    /// Identifiers of every node generated by the expansion.
    pub produced: Vec<NodeId>,
}

impl Expansion {
    /// Returns `true` when the expansion used the given arguments.
    #[must_use]
    pub const fn matches(&self, depth_limit: u32, complexity_threshold: u32) -> bool {
        self.depth_limit == depth_limit && self.complexity_threshold == complexity_threshold
    }
}

/// One unit of planned work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNode {
    id: NodeId,
    title: String,
    description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    test_strategy: Option<String>,
    complexity: u32,
    #[serde(default)]
    priority: Priority,
    #[serde(default)]
    dependencies: BTreeSet<NodeId>,
    #[serde(default)]
    parent: Option<NodeId>,
    #[serde(default)]
    children: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expansion: Option<Expansion>,
}

impl TaskNode {
    /// Creates a node with the required identifier and title.
    ///
    /// # Errors
    ///
    /// Returns [`GraphDomainError::EmptyTitle`] if the title is blank.
    pub fn new(id: NodeId, title: impl Into<String>) -> Result<Self, GraphDomainError> {
        let raw_title = title.into();
        let normalized = raw_title.trim();
        if normalized.is_empty() {
            return Err(GraphDomainError::EmptyTitle(id));
        }
        Ok(Self {
            id,
            title: normalized.to_owned(),
            description: String::new(),
            details: None,
            test_strategy: None,
            complexity: 0,
            priority: Priority::default(),
            dependencies: BTreeSet::new(),
            parent: None,
            children: Vec::new(),
            expansion: None,
        })
    }

    /// Sets the human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into().trim().to_owned();
        self
    }

    /// Sets implementation details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        let value = details.into();
        let normalized = value.trim();
        self.details = (!normalized.is_empty()).then(|| normalized.to_owned());
        self
    }

    /// Sets the test strategy.
    #[must_use]
    pub fn with_test_strategy(mut self, test_strategy: impl Into<String>) -> Self {
        let value = test_strategy.into();
        let normalized = value.trim();
        self.test_strategy = (!normalized.is_empty()).then(|| normalized.to_owned());
        self
    }

    /// Sets the complexity score.
    #[must_use]
    pub const fn with_complexity(mut self, complexity: u32) -> Self {
        self.complexity = complexity;
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the dependency set.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = NodeId>) -> Self {
        self.dependencies = dependencies.into_iter().collect();
        self
    }

    /// Sets the parent node.
    #[must_use]
    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Sets the ordered child list.
    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = NodeId>) -> Self {
        self.children = children.into_iter().collect();
        self
    }

    /// Returns the node identifier.
    #[must_use]
    pub const fn id(&self) -> &NodeId {
        &self.id
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns implementation details, if any.
    #[must_use]
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns the test strategy, if any.
    #[must_use]
    pub fn test_strategy(&self) -> Option<&str> {
        self.test_strategy.as_deref()
    }

    /// Returns the complexity score.
    #[must_use]
    pub const fn complexity(&self) -> u32 {
        self.complexity
    }

    /// Returns the priority.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Returns the dependency set.
    #[must_use]
    pub const fn dependencies(&self) -> &BTreeSet<NodeId> {
        &self.dependencies
    }

    /// Returns the parent identifier, if any.
    #[must_use]
    pub const fn parent(&self) -> Option<&NodeId> {
        self.parent.as_ref()
    }

    /// Returns the ordered child identifiers.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Returns `true` when the node has no children.
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns the breakdown marker, if the node has been expanded.
    #[must_use]
    pub const fn expansion(&self) -> Option<&Expansion> {
        self.expansion.as_ref()
    }

    pub(crate) fn set_parent(&mut self, parent: NodeId) {
        self.parent = Some(parent);
    }

    pub(crate) fn push_child(&mut self, child: NodeId) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    pub(crate) fn set_expansion(&mut self, expansion: Expansion) {
        self.expansion = Some(expansion);
    }

    /// Replaces the authoritative planning fields with those of `other`,
    /// keeping hierarchy placement.
    pub(crate) fn refresh_from(&mut self, other: Self) {
        self.title = other.title;
        self.description = other.description;
        self.details = other.details;
        self.test_strategy = other.test_strategy;
        self.complexity = other.complexity;
        self.priority = other.priority;
        self.dependencies = other.dependencies;
        for child in other.children {
            self.push_child(child);
        }
    }
}

//! Label vocabulary applied to tracker items.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Names of the labels the engine manages.
///
/// Passed explicitly to the reconciler and the dependency state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Applied to every item the engine creates.
    pub base: String,
    /// Applied while at least one dependency is open or unresolved.
    pub blocked: String,
    /// Applied to items whose node has children.
    pub parent: String,
    /// Applied to items whose node has no children.
    pub leaf: String,
    /// Applied to surplus items closed during duplicate convergence.
    pub duplicate: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            base: "task".to_owned(),
            blocked: "blocked".to_owned(),
            parent: "epic".to_owned(),
            leaf: "subtask".to_owned(),
            duplicate: "duplicate".to_owned(),
        }
    }
}

impl LabelConfig {
    /// Labels describing a node's shape, excluding the blocked label.
    #[must_use]
    pub fn structural(&self, is_leaf: bool) -> BTreeSet<String> {
        let shape = if is_leaf { &self.leaf } else { &self.parent };
        [self.base.clone(), shape.clone()].into_iter().collect()
    }

    /// Every structural label the reconciler owns.
    #[must_use]
    pub fn managed(&self) -> BTreeSet<String> {
        [self.base.clone(), self.parent.clone(), self.leaf.clone()]
            .into_iter()
            .collect()
    }
}

//! Explicit configuration passed into the sync services.

use crate::tracker::domain::{LabelConfig, RetryPolicy};
use serde::{Deserialize, Serialize};

/// How parent/child links are established.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyMode {
    /// Use tracker-native sub-items, falling back to cross-references.
    #[default]
    Native,
    /// Always write cross-reference notes.
    CrossReference,
}

/// Sync engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Label vocabulary.
    pub labels: LabelConfig,
    /// Tracker retry policy.
    pub retry: RetryPolicy,
    /// Hierarchy strategy.
    pub hierarchy: HierarchyMode,
}

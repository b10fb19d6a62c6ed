//! Derived blocked/unblocked state.

use serde::{Deserialize, Serialize};

/// Whether a node may be worked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockedState {
    /// At least one dependency is open or unresolved.
    Blocked,
    /// Every dependency is closed, or there are none.
    Unblocked,
}

/// Observed state of one dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyStatus {
    /// The dependency's item is open.
    Open,
    /// The dependency's item is closed.
    Closed,
    /// The dependency has no item, or its item no longer exists.
    Unresolved,
}

impl BlockedState {
    /// Derives the state from dependency statuses.
    ///
    /// Unresolved dependencies keep the node blocked.
    #[must_use]
    pub fn derive(statuses: impl IntoIterator<Item = DependencyStatus>) -> Self {
        if statuses
            .into_iter()
            .all(|status| status == DependencyStatus::Closed)
        {
            Self::Unblocked
        } else {
            Self::Blocked
        }
    }

    /// Returns `true` for [`BlockedState::Blocked`].
    #[must_use]
    pub const fn is_blocked(self) -> bool {
        matches!(self, Self::Blocked)
    }
}

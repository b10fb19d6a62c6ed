//! Tracker item value objects.

use super::{ItemId, ParseItemStateError, TrackerDomainError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Open/closed state of a tracker item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    /// Work outstanding.
    Open,
    /// Work finished or abandoned.
    Closed,
}

impl ItemState {
    /// Returns the canonical lowercase representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl TryFrom<&str> for ItemState {
    type Error = ParseItemStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            _ => Err(ParseItemStateError(value.to_owned())),
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of an item as read from the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerItem {
    /// Tracker-assigned item number.
    pub id: ItemId,
    /// Item title.
    pub title: String,
    /// Raw item body.
    pub body: String,
    /// Labels currently applied.
    pub labels: BTreeSet<String>,
    /// Open/closed state.
    pub state: ItemState,
}

impl TrackerItem {
    /// Returns `true` when the label is applied.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }
}

/// Payload for creating a new tracker item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDraft {
    title: String,
    body: String,
    labels: BTreeSet<String>,
}

impl ItemDraft {
    /// Creates a draft with a validated title.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerDomainError::EmptyTitle`] if the title is blank.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Result<Self, TrackerDomainError> {
        let raw_title = title.into();
        let normalized = raw_title.trim();
        if normalized.is_empty() {
            return Err(TrackerDomainError::EmptyTitle);
        }
        Ok(Self {
            title: normalized.to_owned(),
            body: body.into(),
            labels: BTreeSet::new(),
        })
    }

    /// Sets the initial labels.
    #[must_use]
    pub fn with_labels(mut self, labels: impl IntoIterator<Item = String>) -> Self {
        self.labels = labels
            .into_iter()
            .map(|label| label.trim().to_owned())
            .filter(|label| !label.is_empty())
            .collect();
        self
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns the initial labels.
    #[must_use]
    pub const fn labels(&self) -> &BTreeSet<String> {
        &self.labels
    }
}

/// Partial update of an existing tracker item. `None` fields are left as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemUpdate {
    /// Replacement title.
    pub title: Option<String>,
    /// Replacement body.
    pub body: Option<String>,
    /// Replacement label set.
    pub labels: Option<BTreeSet<String>>,
}

impl ItemUpdate {
    /// Returns `true` when the update changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none() && self.labels.is_none()
    }
}

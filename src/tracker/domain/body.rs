//! Persisted item body format.
//!
//! Bodies written by the engine have three parts:
//!
//! ```text
//! <!-- plansync:metadata
//! {"node_id":"3.1","parent_id":"3",...}
//! -->
//!
//! ## Description
//! ...
//!
//! <!-- plansync:links -->
//! - Parent: #12
//! - Child: #14
//! ```
//!
//! The metadata block anchors identity recovery, the content is the
//! human-readable part, and the links section holds hierarchy cross-references.

use super::{ItemId, TrackerDomainError};
use crate::graph::domain::{NodeId, Priority};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

const METADATA_OPEN: &str = "<!-- plansync:metadata";
const METADATA_CLOSE: &str = "-->";
const LINKS_MARKER: &str = "<!-- plansync:links -->";
const PARENT_PREFIX: &str = "- Parent: #";
const CHILD_PREFIX: &str = "- Child: #";

/// Structured metadata identifying the node an item materializes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataBlock {
    /// Graph node identifier.
    pub node_id: NodeId,
    /// Parent node identifier, if any.
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    /// Dependency node identifiers.
    #[serde(default)]
    pub dependencies: BTreeSet<NodeId>,
    /// Planner complexity score.
    pub complexity: u32,
    /// Planner priority.
    #[serde(default)]
    pub priority: Priority,
    /// Name of the writing tool.
    pub generator: String,
    /// Version of the writing tool.
    pub generator_version: String,
    /// When the block was written.
    pub generated_at: DateTime<Utc>,
}

impl MetadataBlock {
    /// Returns `true` when both blocks describe the same planned work.
    ///
    /// Generator identity and timestamp are provenance, not plan content,
    /// and are ignored.
    #[must_use]
    pub fn same_plan(&self, other: &Self) -> bool {
        self.node_id == other.node_id
            && self.parent_id == other.parent_id
            && self.dependencies == other.dependencies
            && self.complexity == other.complexity
            && self.priority == other.priority
    }
}

/// Hierarchy cross-reference note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LinkNote {
    /// This item is a child of the referenced item.
    Parent(ItemId),
    /// This item is the parent of the referenced item.
    Child(ItemId),
}

impl LinkNote {
    fn parse(line: &str) -> Option<Self> {
        let note = line.trim();
        if let Some(number) = note.strip_prefix(PARENT_PREFIX) {
            return parse_item_id(number).map(Self::Parent);
        }
        note.strip_prefix(CHILD_PREFIX)
            .and_then(parse_item_id)
            .map(Self::Child)
    }
}

fn parse_item_id(number: &str) -> Option<ItemId> {
    number
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|value| ItemId::new(value).ok())
}

impl fmt::Display for LinkNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parent(id) => write!(f, "{PARENT_PREFIX}{}", id.value()),
            Self::Child(id) => write!(f, "{CHILD_PREFIX}{}", id.value()),
        }
    }
}

/// Parsed item body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemBody {
    metadata: Option<MetadataBlock>,
    content: String,
    links: Vec<LinkNote>,
}

impl ItemBody {
    /// Creates a body from metadata and rendered content.
    #[must_use]
    pub fn new(metadata: MetadataBlock, content: impl Into<String>) -> Self {
        Self {
            metadata: Some(metadata),
            content: content.into().trim().to_owned(),
            links: Vec::new(),
        }
    }

    /// Parses a raw body.
    ///
    /// Bodies without a metadata block (items not written by the engine) are
    /// accepted with `metadata() == None`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerDomainError::MalformedMetadata`] when a metadata
    /// block is present but cannot be decoded.
    pub fn parse(raw: &str) -> Result<Self, TrackerDomainError> {
        let trimmed = raw.trim_start();
        let (metadata, rest) = match trimmed.strip_prefix(METADATA_OPEN) {
            Some(after_open) => {
                let (json, rest) = after_open.split_once(METADATA_CLOSE).ok_or_else(|| {
                    TrackerDomainError::MalformedMetadata("unterminated metadata block".to_owned())
                })?;
                let block: MetadataBlock = serde_json::from_str(json.trim())
                    .map_err(|err| TrackerDomainError::MalformedMetadata(err.to_string()))?;
                (Some(block), rest)
            }
            None => (None, trimmed),
        };

        let (content, links) = match rest.split_once(LINKS_MARKER) {
            Some((content, links)) => (content, links.lines().filter_map(LinkNote::parse).collect()),
            None => (rest, Vec::new()),
        };

        Ok(Self {
            metadata,
            content: content.trim().to_owned(),
            links,
        })
    }

    /// Returns the metadata block, if present.
    #[must_use]
    pub const fn metadata(&self) -> Option<&MetadataBlock> {
        self.metadata.as_ref()
    }

    /// Returns the human-readable content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns hierarchy notes in insertion order.
    #[must_use]
    pub fn links(&self) -> &[LinkNote] {
        &self.links
    }

    /// Returns `true` when the note is present.
    #[must_use]
    pub fn has_link(&self, note: LinkNote) -> bool {
        self.links.contains(&note)
    }

    /// Adds a hierarchy note; returns `false` if it was already present.
    pub fn add_link(&mut self, note: LinkNote) -> bool {
        if self.has_link(note) {
            return false;
        }
        self.links.push(note);
        true
    }

    /// Carries hierarchy notes over from a previously written body.
    #[must_use]
    pub fn with_links_from(mut self, previous: &Self) -> Self {
        for note in &previous.links {
            self.add_link(*note);
        }
        self
    }

    /// Renders the body in its persisted form.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerDomainError::MalformedMetadata`] if the metadata
    /// block cannot be serialized.
    pub fn render(&self) -> Result<String, TrackerDomainError> {
        let mut sections = Vec::with_capacity(3);
        if let Some(metadata) = &self.metadata {
            let json = serde_json::to_string(metadata)
                .map_err(|err| TrackerDomainError::MalformedMetadata(err.to_string()))?;
            sections.push(format!("{METADATA_OPEN}\n{json}\n{METADATA_CLOSE}"));
        }
        if !self.content.is_empty() {
            sections.push(self.content.clone());
        }
        if !self.links.is_empty() {
            let notes: Vec<String> = self.links.iter().map(ToString::to_string).collect();
            sections.push(format!("{LINKS_MARKER}\n{}", notes.join("\n")));
        }
        Ok(format!("{}\n", sections.join("\n\n")))
    }
}

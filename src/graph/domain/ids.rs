//! Identifier and validated scalar types for the graph domain.

use super::GraphDomainError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fmt::Write as _;

/// Identifier of a task node, unique within one graph.
///
/// Identifiers are produced by the external planner and look like `3` or
/// `3.1.2`; they are opaque to the engine apart from being non-empty and free
/// of whitespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    /// Creates a validated node identifier.
    ///
    /// # Errors
    ///
    /// Returns [`GraphDomainError::EmptyNodeId`] when the value is blank or
    /// [`GraphDomainError::InvalidNodeId`] when it contains whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, GraphDomainError> {
        let raw = value.into();
        let normalized = raw.trim();
        if normalized.is_empty() {
            return Err(GraphDomainError::EmptyNodeId);
        }
        if normalized.chars().any(char::is_whitespace) {
            return Err(GraphDomainError::InvalidNodeId(raw));
        }
        Ok(Self(normalized.to_owned()))
    }

    /// Returns the identifier qualified beneath `parent` (`parent.self`).
    ///
    /// Identifiers that already contain a `.` are treated as fully qualified.
    #[must_use]
    pub fn qualified_under(&self, parent: &Self) -> Self {
        if self.0.contains('.') {
            return self.clone();
        }
        Self(format!("{}.{}", parent.0, self.0))
    }

    /// Returns the identifier as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NodeId {
    type Error = GraphDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeId> for String {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// SHA-256 digest of the source requirements document, as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Hashes raw document contents.
    #[must_use]
    pub fn of(contents: &[u8]) -> Self {
        let digest = Sha256::digest(contents);
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            // Writing into a String cannot fail.
            let _ignored = write!(hex, "{byte:02x}");
        }
        Self(hex)
    }

    /// Parses an existing hex digest.
    ///
    /// # Errors
    ///
    /// Returns [`GraphDomainError::InvalidContentHash`] when the value is empty
    /// or contains characters outside `[0-9a-f]`.
    pub fn parse(value: impl Into<String>) -> Result<Self, GraphDomainError> {
        let raw = value.into();
        let is_valid = !raw.is_empty()
            && raw
                .chars()
                .all(|ch| ch.is_ascii_digit() || ('a'..='f').contains(&ch));
        if !is_valid {
            return Err(GraphDomainError::InvalidContentHash(raw));
        }
        Ok(Self(raw))
    }

    /// Returns the digest as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ContentHash {
    type Error = GraphDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ContentHash> for String {
    fn from(value: ContentHash) -> Self {
        value.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

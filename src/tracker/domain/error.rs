//! Error types for tracker domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing tracker domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrackerDomainError {
    /// The item number is invalid.
    #[error("invalid tracker item number {0}, expected a positive integer")]
    InvalidItemId(u64),

    /// The repository name does not follow `owner/repo` format.
    #[error("invalid repository name '{0}', expected owner/repo")]
    InvalidRepository(String),

    /// The item title is empty after trimming.
    #[error("tracker item title must not be empty")]
    EmptyTitle,

    /// A label name is empty after trimming.
    #[error("label name must not be empty")]
    EmptyLabel,

    /// The metadata block in an item body could not be decoded.
    #[error("malformed metadata block: {0}")]
    MalformedMetadata(String),
}

/// Error returned while parsing item states from tracker payloads.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown tracker item state: {0}")]
pub struct ParseItemStateError(pub String);

//! Domain model for the external issue tracker.
//!
//! Tracker items are owned by the tracker; the engine reads their state and
//! rewrites only the bodies and labels it wrote itself.

mod body;
mod error;
mod ids;
mod item;
mod labels;
mod retry;

pub use body::{ItemBody, LinkNote, MetadataBlock};
pub use error::{ParseItemStateError, TrackerDomainError};
pub use ids::{ItemId, RepositoryFullName};
pub use item::{ItemDraft, ItemState, ItemUpdate, TrackerItem};
pub use labels::LabelConfig;
pub use retry::RetryPolicy;

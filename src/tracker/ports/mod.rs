//! Port contracts for tracker access.

pub mod client;
pub mod hierarchy;

pub use client::{TrackerClient, TrackerError, TrackerResult};
pub use hierarchy::NativeHierarchy;

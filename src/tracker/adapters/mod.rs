//! Adapter implementations of the tracker ports.

pub mod github;
pub mod memory;
pub mod retry;

pub use github::GitHubTracker;
pub use memory::InMemoryTracker;
pub use retry::RetryingTracker;

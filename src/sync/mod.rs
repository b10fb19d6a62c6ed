//! Task graph reconciliation.
//!
//! This module materializes graph nodes as tracker items and keeps them in
//! step with the graph: a persisted identity mapping anchors idempotency,
//! the reconciler creates or rewrites items, the dependency state machine
//! maintains blocked labels, the hierarchy linker records parent/child
//! links, and snapshots after every node make a failed run resumable.
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;

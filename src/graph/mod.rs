//! Task graph model and producer integration.
//!
//! This module models the hierarchical task graph produced by an external
//! planner from a requirements document, validates its structural invariants
//! (unique identifiers, resolvable references, consistent hierarchy, acyclic
//! dependencies), and exposes the producer as a port:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]

pub mod adapters;
pub mod domain;
pub mod ports;

#[cfg(test)]
mod tests;

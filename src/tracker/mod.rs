//! Issue tracker integration.
//!
//! This module wraps the external tracker behind a narrow capability port so
//! the sync engine can create and update items, move labels, read item state,
//! and link hierarchies without knowing which tracker it talks to. Retry,
//! backoff and per-call timeouts live in the [`adapters::retry`] decorator.
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]

pub mod adapters;
pub mod domain;
pub mod ports;

#[cfg(test)]
mod tests;

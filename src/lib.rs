//! Plansync: task graph to issue tracker reconciliation.
//!
//! This crate takes the hierarchical task graph an external planner produces
//! from a requirements document and keeps an issue tracker in line with it:
//! one item per node, hierarchy links between parents and children, and a
//! blocked label that follows dependency state. Runs are idempotent and
//! resumable from snapshots.
//!
//! # Architecture
//!
//! Plansync follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (tracker API, files, etc.)
//!
//! # Modules
//!
//! - [`graph`]: Task graph model, validation and producer integration
//! - [`tracker`]: Tracker capability port and its adapters
//! - [`sync`]: Reconciliation, dependency tracking, hierarchy and snapshots
//! - [`config`]: File-based configuration

pub mod config;
pub mod graph;
pub mod sync;
pub mod tracker;

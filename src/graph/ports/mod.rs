//! Port contracts for graph production.
//!
//! Ports define infrastructure-agnostic interfaces used by sync services.

pub mod producer;

pub use producer::{GraphProducer, NodeExpander, ProduceRequest, ProducerError, ProducerResult};

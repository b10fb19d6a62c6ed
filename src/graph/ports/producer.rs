//! Producer port for turning documents into task graphs.

use crate::graph::domain::{GraphDomainError, SubGraph, TaskGraph, TaskNode};
use async_trait::async_trait;
use camino::Utf8PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Result type for graph producer operations.
pub type ProducerResult<T> = Result<T, ProducerError>;

/// Parameters for producing a graph from a requirements document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceRequest {
    /// Path of the requirements document.
    pub source_path: Utf8PathBuf,
    /// Nodes above this complexity are split further.
    pub complexity_threshold: u32,
    /// Maximum nesting depth of the produced graph.
    pub max_depth: u32,
}

/// Graph production contract.
#[async_trait]
pub trait GraphProducer: Send + Sync {
    /// Produces a full task graph from a requirements document.
    async fn produce(&self, request: &ProduceRequest) -> ProducerResult<TaskGraph>;
}

/// Manual breakdown contract.
#[async_trait]
pub trait NodeExpander: Send + Sync {
    /// Generates a bounded sub-graph beneath an existing node.
    ///
    /// Generated nodes must lie at most `depth_limit` levels below `node`,
    /// and every generated leaf must have complexity at or below
    /// `complexity_threshold` unless it sits at the depth limit.
    async fn breakdown(
        &self,
        node: &TaskNode,
        depth_limit: u32,
        complexity_threshold: u32,
    ) -> ProducerResult<SubGraph>;
}

/// Errors returned by graph producer implementations.
#[derive(Debug, Clone, Error)]
pub enum ProducerError {
    /// The producer output was structurally invalid.
    #[error(transparent)]
    Graph(#[from] GraphDomainError),

    /// The producer process exited unsuccessfully.
    #[error("graph producer exited with status {status}: {stderr}")]
    Failed {
        /// Exit status description.
        status: String,
        /// Captured standard error.
        stderr: String,
    },

    /// Reading the source document or spawning the producer failed.
    #[error("graph producer I/O error: {0}")]
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for ProducerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

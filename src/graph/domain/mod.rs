//! Domain model for task graphs.
//!
//! The graph domain holds the planner's output: nodes, dependency edges, the
//! parent/child hierarchy, and provenance. It owns structural validation and
//! the merge of breakdown sub-graphs, and has no knowledge of the tracker.

mod document;
mod error;
mod graph;
mod ids;
mod node;

pub use document::{DEFAULT_GRAPH_VERSION, decode_graph, decode_sub_graph};
pub use error::GraphDomainError;
pub use graph::{GraphMetadata, SubGraph, TaskGraph};
pub use ids::{ContentHash, NodeId};
pub use node::{Expansion, Priority, TaskNode};

//! Deterministic breakdown that splits complexity evenly.

use crate::graph::{
    domain::{GraphDomainError, NodeId, SubGraph, TaskNode},
    ports::{NodeExpander, ProducerResult},
};
use async_trait::async_trait;

/// Upper bound on parts generated for a single node.
const MAX_PARTS: u32 = 8;

/// Splits a node into `ceil(complexity / threshold)` sequential parts,
/// recursing until every leaf is at or below the threshold or at the depth
/// limit.
///
/// Parts of one node form a chain: part `n` depends on part `n - 1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvenSplitExpander;

impl EvenSplitExpander {
    /// Creates the expander.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

struct SplitBounds {
    depth_limit: u32,
    threshold: u32,
}

#[async_trait]
impl NodeExpander for EvenSplitExpander {
    async fn breakdown(
        &self,
        node: &TaskNode,
        depth_limit: u32,
        complexity_threshold: u32,
    ) -> ProducerResult<SubGraph> {
        let mut sub_graph = SubGraph::empty(node.id().clone());
        if depth_limit == 0 || node.complexity() <= complexity_threshold {
            return Ok(sub_graph);
        }

        // Numbering continues after children that did not come from an
        // earlier breakdown, so re-expanding reuses the same identifiers.
        let produced = node
            .expansion()
            .map(|expansion| expansion.produced.as_slice())
            .unwrap_or_default();
        let offset = node
            .children()
            .iter()
            .filter(|child| !produced.contains(child))
            .count();
        let bounds = SplitBounds {
            depth_limit,
            threshold: complexity_threshold.max(1),
        };
        split(node, offset, 1, &bounds, &mut sub_graph.nodes)?;
        Ok(sub_graph)
    }
}

fn split(
    node: &TaskNode,
    offset: usize,
    depth: u32,
    bounds: &SplitBounds,
    out: &mut Vec<TaskNode>,
) -> Result<Vec<NodeId>, GraphDomainError> {
    let total = node.complexity();
    let parts = total.div_ceil(bounds.threshold).clamp(2, MAX_PARTS);
    let base = total.checked_div(parts).unwrap_or_default();
    let remainder = total.checked_rem(parts).unwrap_or_default();

    let mut ids = Vec::new();
    let mut previous: Option<NodeId> = None;
    for part in 1..=parts {
        let index = offset + usize::try_from(part).unwrap_or(usize::MAX);
        let id = NodeId::new(format!("{}.{index}", node.id()))?;
        let complexity = base + u32::from(part <= remainder);
        let mut child = TaskNode::new(
            id.clone(),
            format!("{} (part {part} of {parts})", node.title()),
        )?
        .with_description(node.description())
        .with_complexity(complexity)
        .with_priority(node.priority())
        .with_dependencies(previous.take())
        .with_parent(node.id().clone());

        let position = out.len();
        out.push(child.clone());
        if complexity > bounds.threshold && depth < bounds.depth_limit {
            let grandchildren = split(&child, 0, depth + 1, bounds, out)?;
            child = child.with_children(grandchildren);
            if let Some(slot) = out.get_mut(position) {
                *slot = child;
            }
        }
        previous = Some(id.clone());
        ids.push(id);
    }
    Ok(ids)
}

//! Stitches per-block sub-graphs and feature tables into one global graph.
//!
//! Edge origination is owned by exactly one block side, so the merge is a
//! disjoint union keyed by the node pair. A pair reported twice means the
//! halo/ownership logic is broken upstream; that is surfaced loudly instead
//! of being deduplicated, since silent double counting would bias the costs.

use hashbrown::HashMap;
use thiserror::Error;
use tracing::debug;

use crate::features::EdgeFeatures;
use crate::rag::{Edge, RegionGraph};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error(
        "Edge ({u}, {v}) reported by blocks {first_block} and {second_block}, \
         edge ownership is violated"
    )]
    EdgeOwnershipViolation {
        u: u64,
        v: u64,
        first_block: usize,
        second_block: usize,
    },
    #[error("Feature width mismatch: expected {expected}, block {block} has {got}")]
    WidthMismatch {
        expected: usize,
        got: usize,
        block: usize,
    },
    #[error("Block {block} carries features for edge ({u}, {v}) missing from the merged graph")]
    UnknownEdge { u: u64, v: u64, block: usize },
    #[error("Edge ({u}, {v}) has no feature row after merging")]
    MissingFeatures { u: u64, v: u64 },
}

pub type MergeResult<T> = Result<T, MergeError>;

/// Merges per-block sub-graphs into the global region graph.
///
/// Node ids are the original label values, so the global node set is simply
/// the union of the per-block node sets.
pub fn merge_block_graphs(block_graphs: &[RegionGraph]) -> MergeResult<RegionGraph> {
    let mut nodes = Vec::new();
    let mut owner: HashMap<Edge, usize> = HashMap::new();
    for (block, graph) in block_graphs.iter().enumerate() {
        nodes.extend_from_slice(&graph.nodes);
        for &edge in &graph.edges {
            if let Some(&first_block) = owner.get(&edge) {
                return Err(MergeError::EdgeOwnershipViolation {
                    u: edge.u,
                    v: edge.v,
                    first_block,
                    second_block: block,
                });
            }
            owner.insert(edge, block);
        }
    }

    let merged = RegionGraph::new(nodes, owner.keys().copied().collect());
    debug!(
        n_blocks = block_graphs.len(),
        n_nodes = merged.n_nodes(),
        n_edges = merged.n_edges(),
        "merged block graphs"
    );
    Ok(merged)
}

/// Merges per-block feature tables into one table aligned with the merged
/// graph's edge order. Every merged edge must receive exactly one row.
pub fn merge_block_features(
    merged: &RegionGraph,
    parts: &[(&RegionGraph, &EdgeFeatures)],
) -> MergeResult<EdgeFeatures> {
    let width = parts
        .iter()
        .map(|(_, features)| features.width())
        .find(|&w| w > 0)
        .unwrap_or(0);

    let edge_index = merged.edge_index();
    let mut features = EdgeFeatures::new(merged.n_edges(), width);
    let mut owner: Vec<Option<usize>> = vec![None; merged.n_edges()];

    for (block, (graph, table)) in parts.iter().enumerate() {
        if table.n_edges() > 0 && table.width() != width {
            return Err(MergeError::WidthMismatch {
                expected: width,
                got: table.width(),
                block,
            });
        }
        for (local, &edge) in graph.edges.iter().enumerate() {
            let global = match edge_index.get(&edge) {
                Some(&global) => global,
                None => {
                    return Err(MergeError::UnknownEdge {
                        u: edge.u,
                        v: edge.v,
                        block,
                    })
                }
            };
            if let Some(first_block) = owner[global] {
                return Err(MergeError::EdgeOwnershipViolation {
                    u: edge.u,
                    v: edge.v,
                    first_block,
                    second_block: block,
                });
            }
            features.row_mut(global).copy_from_slice(table.row(local));
            owner[global] = Some(block);
        }
    }

    for (global, o) in owner.iter().enumerate() {
        if o.is_none() {
            let Edge { u, v } = merged.edges[global];
            return Err(MergeError::MissingFeatures { u, v });
        }
    }
    Ok(features)
}

//! The multicut / correlation-clustering objective.
//!
//! An edge is cut when its endpoints carry different labels. The energy of a
//! labeling is `sum over cut edges of max(c, 0) + sum over uncut edges of
//! max(-c, 0)`: cutting an attractive edge and keeping a repulsive edge both
//! cost their magnitude.

use crate::rag::{NodeIndex, RegionGraph};

pub(crate) fn energy_over_edges(
    edges: &[(usize, usize)],
    costs: &[f64],
    labels: &[u64],
) -> f64 {
    debug_assert_eq!(edges.len(), costs.len());
    edges
        .iter()
        .zip(costs)
        .map(|(&(u, v), &cost)| {
            if labels[u] != labels[v] {
                cost.max(0.0)
            } else {
                (-cost).max(0.0)
            }
        })
        .sum()
}

/// Energy of a labeling, indexed by the graph's sorted node order.
pub fn multicut_energy(graph: &RegionGraph, costs: &[f64], labeling: &[u64]) -> f64 {
    assert_eq!(costs.len(), graph.n_edges(), "one cost per edge");
    assert_eq!(labeling.len(), graph.n_nodes(), "one label per node");

    let index = NodeIndex::new(graph);
    graph
        .edges
        .iter()
        .zip(costs)
        .map(|(edge, &cost)| {
            let u = index.index(edge.u).expect("edge endpoint is a node");
            let v = index.index(edge.v).expect("edge endpoint is a node");
            if labeling[u] != labeling[v] {
                cost.max(0.0)
            } else {
                (-cost).max(0.0)
            }
        })
        .sum()
}

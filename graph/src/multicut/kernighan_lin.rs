//! Local search with a greedy warm start.
//!
//! Starting from the warm-start labeling (or all singletons), nodes are
//! repeatedly relocated to the adjacent partition that lowers the energy the
//! most, until a sweep makes no move or the deadline expires. Every accepted
//! move strictly decreases the energy, so the current labeling is always the
//! best found and can be returned at any cutoff.

use hashbrown::HashMap;

use super::{Deadline, DenseGraph};
use crate::ufd::Ufd;

/// Minimal gain for a relocation; guards termination under float noise.
const MIN_GAIN: f64 = 1e-12;

/// How many nodes are processed between deadline checks.
const DEADLINE_STRIDE: usize = 1024;

pub(crate) fn solve(
    graph: &DenseGraph,
    costs: &[f64],
    warm_start: bool,
    deadline: &Deadline,
) -> Vec<u64> {
    let n = graph.n_nodes;
    let mut labels: Vec<u64> = if warm_start {
        greedy_merge_labels(graph, costs)
    } else {
        (0..n as u64).collect()
    };
    // fresh labels for split-off singletons must never collide
    let mut next_label = n as u64;

    let mut scores: HashMap<u64, f64> = HashMap::new();
    let mut improved = true;
    while improved && !deadline.expired() {
        improved = false;
        for node in 0..n {
            if node % DEADLINE_STRIDE == 0 && deadline.expired() {
                break;
            }
            if graph.adjacency[node].is_empty() {
                continue;
            }

            // attraction towards each adjacent partition: the energy of this
            // node's incident edges drops by score(l) when it joins label l
            scores.clear();
            for &(neighbor, edge) in &graph.adjacency[node] {
                *scores.entry(labels[neighbor]).or_insert(0.0) += costs[edge];
            }
            let current = labels[node];
            let current_score = scores.get(&current).copied().unwrap_or(0.0);

            // deterministic argmax: iterate adjacency order, smallest label
            // wins ties; a fresh singleton scores 0
            let mut best_label = current;
            let mut best_score = current_score;
            for &(neighbor, _) in &graph.adjacency[node] {
                let candidate = labels[neighbor];
                let score = scores[&candidate];
                if score > best_score + MIN_GAIN
                    || (score > best_score - MIN_GAIN && candidate < best_label)
                {
                    best_label = candidate;
                    best_score = score;
                }
            }

            if best_score > current_score + MIN_GAIN {
                labels[node] = best_label;
                improved = true;
            } else if current_score < -MIN_GAIN && best_score <= MIN_GAIN {
                // all adjacent partitions repel: split off as a singleton
                labels[node] = next_label;
                next_label += 1;
                improved = true;
            }
        }
    }
    labels
}

/// Warm start: union-find merge of every strictly attractive edge.
pub(crate) fn greedy_merge_labels(graph: &DenseGraph, costs: &[f64]) -> Vec<u64> {
    let mut ufd = Ufd::new(graph.n_nodes);
    for (index, &(u, v)) in graph.edges.iter().enumerate() {
        if costs[index] > 0.0 {
            ufd.union(u, v);
        }
    }
    ufd.labeling().into_iter().map(|root| root as u64).collect()
}

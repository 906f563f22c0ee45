//! Fusion moves: iteratively fuse the current labeling with proposals from
//! the other solvers, keeping whichever side of each agreement region lowers
//! the energy.
//!
//! A fuse contracts the common refinement of the two labelings (nodes that
//! agree in both collapse to one meta node) and solves the contracted
//! problem, so the fused labeling can mix both inputs at region granularity.
//! The proposal policy is an internal heuristic: the solver rotates through
//! greedy contraction, cold-started local search and local search on
//! perturbed costs.

use hashbrown::HashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::objective::energy_over_edges;
use super::{gaec, kernighan_lin, Deadline, DenseGraph, SolveOptions};

const MAX_ROUNDS: usize = 12;
const MAX_STALL_ROUNDS: usize = 3;
const PERTURBATION: f64 = 0.15;
const RNG_SEED: u64 = 0x9e3779b97f4a7c15;

pub(crate) fn solve(
    graph: &DenseGraph,
    costs: &[f64],
    options: &SolveOptions,
    deadline: &Deadline,
) -> Vec<u64> {
    let mut current = kernighan_lin::solve(graph, costs, options.warm_start, deadline);
    let mut energy = energy_over_edges(&graph.edges, costs, &current);

    let mut rng = StdRng::seed_from_u64(RNG_SEED);
    let mut stalled = 0usize;
    for round in 0..MAX_ROUNDS {
        if deadline.expired() || stalled >= MAX_STALL_ROUNDS {
            break;
        }
        let proposal = match round % 3 {
            0 => gaec::solve(graph, costs),
            1 => kernighan_lin::solve(graph, costs, false, deadline),
            _ => {
                let scale = costs
                    .iter()
                    .fold(0.0f64, |acc, c| acc.max(c.abs()))
                    .max(1.0);
                let perturbed: Vec<f64> = costs
                    .iter()
                    .map(|&c| c + rng.random_range(-PERTURBATION..PERTURBATION) * scale)
                    .collect();
                kernighan_lin::solve(graph, &perturbed, options.warm_start, deadline)
            }
        };

        let fused = fuse(graph, costs, &current, &proposal, deadline);
        let fused_energy = energy_over_edges(&graph.edges, costs, &fused);
        if fused_energy < energy {
            debug!(round, energy = fused_energy, "fusion accepted proposal");
            current = fused;
            energy = fused_energy;
            stalled = 0;
        } else {
            stalled += 1;
        }
    }
    current
}

/// Contracts the common refinement of two labelings and re-solves the
/// contracted problem with local search.
fn fuse(
    graph: &DenseGraph,
    costs: &[f64],
    a: &[u64],
    b: &[u64],
    deadline: &Deadline,
) -> Vec<u64> {
    let mut meta_of: HashMap<(u64, u64), usize> = HashMap::new();
    let mut meta: Vec<usize> = Vec::with_capacity(graph.n_nodes);
    for node in 0..graph.n_nodes {
        let next = meta_of.len();
        let id = *meta_of.entry((a[node], b[node])).or_insert(next);
        meta.push(id);
    }

    let mut contracted_costs: HashMap<(usize, usize), f64> = HashMap::new();
    for (index, &(u, v)) in graph.edges.iter().enumerate() {
        let (mu, mv) = (meta[u], meta[v]);
        if mu == mv {
            continue;
        }
        let key = if mu < mv { (mu, mv) } else { (mv, mu) };
        *contracted_costs.entry(key).or_insert(0.0) += costs[index];
    }
    let mut pairs: Vec<((usize, usize), f64)> = contracted_costs.into_iter().collect();
    pairs.sort_unstable_by(|(ka, _), (kb, _)| ka.cmp(kb));

    let contracted = DenseGraph::from_edges(
        meta_of.len(),
        pairs.iter().map(|&(pair, _)| pair).collect(),
    );
    let contracted_cost_values: Vec<f64> = pairs.iter().map(|&(_, cost)| cost).collect();
    let meta_labels =
        kernighan_lin::solve(&contracted, &contracted_cost_values, true, deadline);

    (0..graph.n_nodes)
        .map(|node| meta_labels[meta[node]])
        .collect()
}

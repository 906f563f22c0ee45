//! Greedy additive edge contraction.
//!
//! Repeatedly contracts the currently most attractive edge, summing the
//! costs of edges that become parallel, until no strictly positive edge
//! remains. Ties break towards the earliest queue generation, so the result
//! is deterministic in the original edge order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use hashbrown::{HashMap, HashSet};

use super::DenseGraph;
use crate::ufd::Ufd;

#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    cost: f64,
    generation: u64,
    u: usize,
    v: usize,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // max-heap: highest cost first, then earliest generation
        self.cost
            .total_cmp(&other.cost)
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

#[inline]
fn pair_key(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

pub(crate) fn solve(graph: &DenseGraph, costs: &[f64]) -> Vec<u64> {
    let mut ufd = Ufd::new(graph.n_nodes);
    let mut neighbors: Vec<HashSet<usize>> = vec![HashSet::new(); graph.n_nodes];
    let mut pair_costs: HashMap<(usize, usize), (f64, u64)> = HashMap::new();
    let mut queue = BinaryHeap::new();
    let mut generation = 0u64;

    for (index, &(u, v)) in graph.edges.iter().enumerate() {
        let key = pair_key(u, v);
        let entry = pair_costs.entry(key).or_insert((0.0, index as u64));
        entry.0 += costs[index];
        neighbors[u].insert(v);
        neighbors[v].insert(u);
        generation = generation.max(index as u64 + 1);
    }
    for (&(u, v), &(cost, gen)) in &pair_costs {
        queue.push(QueueEntry {
            cost,
            generation: gen,
            u,
            v,
        });
    }

    while let Some(entry) = queue.pop() {
        let root_u = ufd.find(entry.u);
        let root_v = ufd.find(entry.v);
        if root_u == root_v {
            continue;
        }
        let key = pair_key(root_u, root_v);
        match pair_costs.get(&key) {
            Some(&(_, gen)) if gen == entry.generation => {}
            _ => continue, // superseded entry
        }
        if entry.cost <= 0.0 {
            break;
        }

        ufd.union(root_u, root_v);
        let merged = ufd.find(root_u);
        let absorbed = if merged == root_u { root_v } else { root_u };

        pair_costs.remove(&key);
        neighbors[merged].remove(&absorbed);
        let absorbed_neighbors = std::mem::take(&mut neighbors[absorbed]);
        let mut touched: Vec<usize> = Vec::new();
        for x in absorbed_neighbors {
            if x == merged {
                continue;
            }
            neighbors[x].remove(&absorbed);
            let (cost, _) = pair_costs
                .remove(&pair_key(absorbed, x))
                .expect("neighbor pair has a cost");
            let combined = pair_costs
                .entry(pair_key(merged, x))
                .or_insert((0.0, generation));
            combined.0 += cost;
            touched.push(x);
        }
        for x in touched {
            neighbors[merged].insert(x);
            neighbors[x].insert(merged);
            let entry = pair_costs
                .get_mut(&pair_key(merged, x))
                .expect("pair just updated");
            entry.1 = generation;
            queue.push(QueueEntry {
                cost: entry.0,
                generation,
                u: merged,
                v: x,
            });
            generation += 1;
        }
    }

    ufd.labeling().into_iter().map(|root| root as u64).collect()
}

//! Decomposition solving: union-find merge of every attractive edge splits
//! the graph into components with no attractive edges between them, each
//! component is solved independently on a bounded worker pool, and the
//! per-component label spaces are stitched with an exclusive prefix sum.
//!
//! Components share no edges by construction, so sub-solves only touch their
//! own nodes; the offsets array is the single synchronization point between
//! solving and writing the stitched labeling.

use rayon::prelude::*;
use tracing::debug;

use common::UnsafeSendPtr;

use super::{kernighan_lin, Deadline, DenseGraph, SolveError, SolveOptions, SolveResult};
use crate::ufd::{relabel_consecutive, Ufd};

pub(crate) fn solve(
    graph: &DenseGraph,
    costs: &[f64],
    options: &SolveOptions,
    deadline: &Deadline,
) -> SolveResult<Vec<u64>> {
    let n = graph.n_nodes;
    if n == 0 {
        return Ok(Vec::new());
    }

    // attractive pre-clustering
    let mut ufd = Ufd::new(n);
    for (index, &(u, v)) in graph.edges.iter().enumerate() {
        if costs[index] > 0.0 {
            ufd.union(u, v);
        }
    }
    let mut component: Vec<u64> = ufd.labeling().into_iter().map(|root| root as u64).collect();
    let n_components = relabel_consecutive(&mut component) as usize;

    let mut component_nodes: Vec<Vec<usize>> = vec![Vec::new(); n_components];
    let mut local_of: Vec<usize> = vec![0; n];
    for (node, &c) in component.iter().enumerate() {
        local_of[node] = component_nodes[c as usize].len();
        component_nodes[c as usize].push(node);
    }

    // internal edges, with their original costs, in local node indices
    let mut component_edges: Vec<Vec<((usize, usize), f64)>> = vec![Vec::new(); n_components];
    for (index, &(u, v)) in graph.edges.iter().enumerate() {
        if component[u] == component[v] {
            component_edges[component[u] as usize]
                .push(((local_of[u], local_of[v]), costs[index]));
        }
    }
    debug!(
        n_nodes = n,
        n_components, "decomposed graph into components"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.n_threads.max(1))
        .build()?;

    // independent sub-solves; a component with a single node needs no solver
    let results: Vec<(Vec<u64>, u64)> = pool.install(|| {
        component_nodes
            .par_iter()
            .zip(component_edges.par_iter())
            .enumerate()
            .map(|(c, (nodes, edges))| {
                if nodes.len() == 1 {
                    return Ok((vec![0], 1));
                }
                let sub_graph = DenseGraph::from_edges(
                    nodes.len(),
                    edges.iter().map(|&(pair, _)| pair).collect(),
                );
                let sub_costs: Vec<f64> = edges.iter().map(|&(_, cost)| cost).collect();
                let mut labels =
                    kernighan_lin::solve(&sub_graph, &sub_costs, options.warm_start, deadline);
                let count = relabel_consecutive(&mut labels);
                if labels.len() != nodes.len() || (count == 0 && !nodes.is_empty()) {
                    return Err(SolveError::EmptyComponentSolution {
                        component: c,
                        n_nodes: nodes.len(),
                    });
                }
                Ok((labels, count))
            })
            .collect::<SolveResult<Vec<_>>>()
    })?;

    // every component's label count must be known before any stitched label
    // is written
    let mut offsets = vec![0u64; n_components];
    let mut total = 0u64;
    for (c, &(_, count)) in results.iter().enumerate() {
        offsets[c] = total;
        total += count;
    }

    // disjoint scatter: component c writes only its own nodes
    let mut node_labels = vec![0u64; n];
    let out = UnsafeSendPtr::new(node_labels.as_mut_ptr());
    pool.install(|| {
        component_nodes
            .par_iter()
            .zip(results.par_iter())
            .zip(offsets.par_iter())
            .for_each(|((nodes, (labels, _)), &offset)| {
                let out = out.get();
                for (local, &node) in nodes.iter().enumerate() {
                    unsafe {
                        *out.add(node) = labels[local] + offset;
                    }
                }
            })
    });

    Ok(node_labels)
}

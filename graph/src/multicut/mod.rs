//! Multicut partitioning: given the merged region graph and one signed cost
//! per edge, find a node labeling approximately minimizing the cost of cut
//! edges against the cost of uncut repulsive edges.
//!
//! All solvers are polynomial-time heuristics; interrupting one at a time
//! limit yields the best labeling found so far, never an error.

pub mod decomposition;
pub mod fusion;
pub mod gaec;
pub mod kernighan_lin;
pub mod objective;

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;
use tracing::info;

use crate::rag::RegionGraph;
use crate::ufd::relabel_consecutive;

pub use objective::multicut_energy;

#[derive(Debug, Error)]
pub enum SolveError {
    #[error("Graph has {expected} edges but {got} costs were given")]
    CostArity { expected: usize, got: usize },
    #[error("Cost at index {index} is not finite")]
    NonFiniteCost { index: usize },
    #[error("Component {component} produced no labels for {n_nodes} nodes")]
    EmptyComponentSolution { component: usize, n_nodes: usize },
    #[error("Failed to build solver pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

pub type SolveResult<T> = Result<T, SolveError>;

/// Solver selection, dispatched by name at configuration time.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Debug,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Solver {
    KernighanLin,
    GreedyAdditive,
    Decomposition,
    FusionMoves,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolveOptions {
    /// Interrupt local search once elapsed; the best labeling so far wins.
    pub time_limit: Option<Duration>,
    /// Worker pool size for component-level sub-solves.
    pub n_threads: usize,
    /// Seed local search from a greedy attractive-edge merge.
    pub warm_start: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            time_limit: None,
            n_threads: 1,
            warm_start: true,
        }
    }
}

/// Shared cutoff clock for interruptible searches.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Deadline {
    end: Option<Instant>,
}

impl Deadline {
    pub fn new(limit: Option<Duration>) -> Self {
        Self {
            end: limit.map(|limit| Instant::now() + limit),
        }
    }

    #[inline]
    pub fn expired(&self) -> bool {
        match self.end {
            Some(end) => Instant::now() >= end,
            None => false,
        }
    }
}

/// Graph with dense 0-based node indices, the internal solver representation.
#[derive(Debug, Clone)]
pub(crate) struct DenseGraph {
    pub n_nodes: usize,
    pub edges: Vec<(usize, usize)>,
    /// Per node: (neighbor node, edge index) pairs in edge order.
    pub adjacency: Vec<Vec<(usize, usize)>>,
}

impl DenseGraph {
    pub fn from_edges(n_nodes: usize, edges: Vec<(usize, usize)>) -> Self {
        let mut adjacency = vec![Vec::new(); n_nodes];
        for (index, &(u, v)) in edges.iter().enumerate() {
            debug_assert!(u != v && u < n_nodes && v < n_nodes);
            adjacency[u].push((v, index));
            adjacency[v].push((u, index));
        }
        Self {
            n_nodes,
            edges,
            adjacency,
        }
    }

    pub fn from_region_graph(graph: &RegionGraph) -> Self {
        let index_of: hashbrown::HashMap<u64, usize> = graph
            .nodes
            .iter()
            .enumerate()
            .map(|(index, &label)| (label, index))
            .collect();
        let edges = graph
            .edges
            .iter()
            .map(|edge| (index_of[&edge.u], index_of[&edge.v]))
            .collect();
        Self::from_edges(graph.n_nodes(), edges)
    }
}

impl Solver {
    /// Solves the multicut objective and returns one label per node, indexed
    /// by the graph's sorted node order and relabeled to a dense 0-based
    /// range.
    pub fn solve(
        &self,
        graph: &RegionGraph,
        costs: &[f64],
        options: &SolveOptions,
    ) -> SolveResult<Vec<u64>> {
        if costs.len() != graph.n_edges() {
            return Err(SolveError::CostArity {
                expected: graph.n_edges(),
                got: costs.len(),
            });
        }
        if let Some(index) = costs.iter().position(|c| !c.is_finite()) {
            return Err(SolveError::NonFiniteCost { index });
        }

        let dense = DenseGraph::from_region_graph(graph);
        let deadline = Deadline::new(options.time_limit);
        let started = Instant::now();

        let mut labels = match self {
            Solver::KernighanLin => {
                kernighan_lin::solve(&dense, costs, options.warm_start, &deadline)
            }
            Solver::GreedyAdditive => gaec::solve(&dense, costs),
            Solver::Decomposition => decomposition::solve(&dense, costs, options, &deadline)?,
            Solver::FusionMoves => fusion::solve(&dense, costs, options, &deadline),
        };
        let n_segments = relabel_consecutive(&mut labels);

        info!(
            solver = %self,
            n_nodes = dense.n_nodes,
            n_edges = dense.edges.len(),
            n_segments,
            energy = objective::energy_over_edges(&dense.edges, costs, &labels),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "multicut solved"
        );
        Ok(labels)
    }
}

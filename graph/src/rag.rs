use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use common::Bounds3;

use crate::blocking::Block;
use crate::store::{BlockStore, BlockStoreExt, StoreError};
use crate::volume::{VolumeError, VolumeSource};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to read label sub-volume: {0}")]
    Volume(#[from] VolumeError),
    #[error("Failed to persist block graph: {0}")]
    Store(#[from] StoreError),
}

pub type ExtractResult<T> = Result<T, ExtractError>;

/// Undirected region-adjacency edge, normalized to `u < v`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Edge {
    pub u: u64,
    pub v: u64,
}

impl Edge {
    #[inline]
    pub fn new(a: u64, b: u64) -> Self {
        assert_ne!(a, b, "self edges are not allowed");
        if a < b {
            Self { u: a, v: b }
        } else {
            Self { u: b, v: a }
        }
    }
}

/// Region-adjacency graph: nodes are oversegmentation label values, edges
/// connect spatially adjacent labels. Label 0 is background and never appears.
///
/// Nodes and edges are kept sorted so serialized block graphs are stable
/// across runs.
#[derive(Clone, Default, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RegionGraph {
    pub nodes: Vec<u64>,
    pub edges: Vec<Edge>,
}

impl RegionGraph {
    pub fn new(mut nodes: Vec<u64>, mut edges: Vec<Edge>) -> Self {
        nodes.sort_unstable();
        nodes.dedup();
        edges.sort_unstable();
        edges.dedup();
        Self { nodes, edges }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    /// Map from edge to its position in the sorted edge list.
    pub fn edge_index(&self) -> HashMap<Edge, usize> {
        let mut map = HashMap::with_capacity(self.edges.len());
        for (index, &edge) in self.edges.iter().enumerate() {
            let prev = map.insert(edge, index);
            assert!(prev.is_none(), "Duplicate edge detected: {:?}", edge);
        }
        map
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.nodes.contains(&0) {
            return Err(anyhow::Error::msg("Node 0 is reserved for background"));
        }
        if self.nodes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(anyhow::Error::msg("Nodes must be sorted and unique"));
        }
        if self.edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(anyhow::Error::msg("Edges must be sorted and unique"));
        }
        let node_set: HashSet<u64> = self.nodes.iter().copied().collect();
        for edge in &self.edges {
            if !node_set.contains(&edge.u) || !node_set.contains(&edge.v) {
                return Err(anyhow::anyhow!(
                    "Edge ({}, {}) references a missing node",
                    edge.u,
                    edge.v
                ));
            }
        }
        Ok(())
    }
}

/// Maps node label values to dense 0-based indices and back.
#[derive(Debug, Clone)]
pub struct NodeIndex {
    index_of: HashMap<u64, usize>,
    labels: Vec<u64>,
}

impl NodeIndex {
    pub fn new(graph: &RegionGraph) -> Self {
        let mut index_of = HashMap::with_capacity(graph.nodes.len());
        for (index, &label) in graph.nodes.iter().enumerate() {
            index_of.insert(label, index);
        }
        Self {
            index_of,
            labels: graph.nodes.clone(),
        }
    }

    #[inline]
    pub fn index(&self, label: u64) -> Option<usize> {
        self.index_of.get(&label).copied()
    }

    #[inline]
    pub fn label(&self, index: usize) -> u64 {
        self.labels[index]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// The window a block scans for adjacency: its inner bounds grown by one
/// voxel in the positive direction, clipped to the volume.
///
/// Every 6-neighbor voxel pair has exactly one block whose inner region owns
/// the pair's lower voxel, so restricting edge origination to inner voxels
/// makes seam edges discoverable by exactly one side while the far endpoint
/// may still come from the halo.
pub fn scan_window(inner: &Bounds3, volume_shape: [usize; 3]) -> Bounds3 {
    inner.grown_positive([1, 1, 1], volume_shape)
}

/// Extracts the region-adjacency sub-graph for one block.
///
/// Nodes are all non-zero labels in the scan window; an edge is recorded for
/// every adjacent pair of distinct non-zero labels whose lower voxel lies in
/// the block's inner region.
pub fn extract_block_graph<L>(labels: &L, block: &Block) -> ExtractResult<RegionGraph>
where
    L: VolumeSource<u64> + ?Sized,
{
    let volume_shape = labels.shape();
    let window = scan_window(&block.inner, volume_shape);
    if window.is_empty() {
        return Ok(RegionGraph::default());
    }
    let data = labels.read(&window)?;
    let window_shape = window.shape();

    let mut nodes = HashSet::new();
    let mut edges = HashSet::new();
    for local in window.iter().map(|p| window.local(p)) {
        let label = *data.get(local);
        if label == 0 {
            continue;
        }
        nodes.insert(label);

        let global = [
            window.begin[0] + local[0],
            window.begin[1] + local[1],
            window.begin[2] + local[2],
        ];
        if !block.inner.contains(global) {
            continue;
        }
        for axis in 0..3 {
            let mut neighbor = local;
            neighbor[axis] += 1;
            if neighbor[axis] >= window_shape[axis] {
                continue;
            }
            let other = *data.get(neighbor);
            if other != 0 && other != label {
                edges.insert(Edge::new(label, other));
            }
        }
    }

    Ok(RegionGraph::new(
        nodes.into_iter().collect(),
        edges.into_iter().collect(),
    ))
}

/// Whole-volume extraction in a single window, the trivial-partition
/// equivalent of the blockwise path.
pub fn extract_full_graph<L>(labels: &L) -> ExtractResult<RegionGraph>
where
    L: VolumeSource<u64> + ?Sized,
{
    let shape = labels.shape();
    let block = Block {
        block_id: 0,
        inner: Bounds3::from_shape(shape),
        outer: Bounds3::from_shape(shape),
    };
    extract_block_graph(labels, &block)
}

/// Persists a block graph under its scale-0 key. Re-running a block only
/// overwrites its own key, so partial-failure retries never touch neighbors.
pub fn store_block_graph(
    store: &dyn BlockStore,
    block_id: usize,
    graph: &RegionGraph,
) -> Result<(), StoreError> {
    store.put(&crate::store::sub_graph_key(0, block_id), graph)
}

pub fn load_block_graph(store: &dyn BlockStore, block_id: usize) -> Result<RegionGraph, StoreError> {
    store.get(&crate::store::sub_graph_key(0, block_id))
}

//! End-to-end scenarios: blockwise extraction and feature accumulation over
//! a keyed store, merge, cost transform and partitioning.

use common::Buffer3;

use crate::blocking::compute_blocks;
use crate::config::FeatureConfig;
use crate::costs::probs_to_costs;
use crate::executor::{failed_block_ids, LocalExecutor};
use crate::features::{
    accumulate_boundary_features, load_block_features, stat, store_block_features, EdgeFeatures,
};
use crate::merge::{merge_block_features, merge_block_graphs};
use crate::multicut::{SolveOptions, Solver};
use crate::rag::{extract_block_graph, load_block_graph, store_block_graph, RegionGraph};
use crate::store::{sub_graph_key, BlockStore, BlockStoreExt, MemoryStore};
use crate::volume::MemoryVolume;

const SHAPE: [usize; 3] = [3, 3, 3];

/// Two labels split by a flat plane between x = 1 and x = 2.
fn plane_labels() -> MemoryVolume<u64> {
    let mut labels = Buffer3::new_default(SHAPE);
    for z in 0..3 {
        for y in 0..3 {
            for x in 0..3 {
                *labels.get_mut([z, y, x]) = if x < 2 { 1 } else { 2 };
            }
        }
    }
    MemoryVolume::new(labels)
}

/// Boundary signal: `interface_value` on the voxels flanking the plane,
/// `elsewhere` everywhere else.
fn boundary_signal(interface_value: f64, elsewhere: f64) -> MemoryVolume<f64> {
    let mut signal = Buffer3::new_filled(SHAPE, elsewhere);
    for z in 0..3 {
        for y in 0..3 {
            *signal.get_mut([z, y, 1]) = interface_value;
            *signal.get_mut([z, y, 2]) = interface_value;
        }
    }
    MemoryVolume::new(signal)
}

fn run_pipeline(
    labels: &MemoryVolume<u64>,
    signal: &MemoryVolume<f64>,
    solver: Solver,
) -> anyhow::Result<(RegionGraph, Vec<u64>)> {
    let blocks = compute_blocks(SHAPE, [3, 3, 2], [1, 1, 1], None)?;
    assert_eq!(blocks.len(), 2);
    let config = FeatureConfig::boundary([3, 3, 2]);
    let store = MemoryStore::new();

    let executor = LocalExecutor::new(2);
    let runs = executor.run(&blocks, |block| -> anyhow::Result<()> {
        let graph = extract_block_graph(labels, block)?;
        let features = accumulate_boundary_features(block, labels, signal, &graph, &config)?;
        store_block_graph(&store, block.block_id, &graph)?;
        store_block_features(&store, block.block_id, &features)?;
        Ok(())
    })?;
    assert!(failed_block_ids(&runs).is_empty());

    let mut graphs = Vec::new();
    let mut tables = Vec::new();
    for block in &blocks {
        graphs.push(load_block_graph(&store, block.block_id)?);
        tables.push(load_block_features(&store, block.block_id)?);
    }
    let merged = merge_block_graphs(&graphs)?;
    let parts: Vec<(&RegionGraph, &EdgeFeatures)> =
        graphs.iter().zip(tables.iter()).collect();
    let features = merge_block_features(&merged, &parts)?;

    let probabilities: Vec<f64> = (0..merged.n_edges())
        .map(|edge| features.value(edge, 0, stat::MEAN))
        .collect();
    let costs = probs_to_costs(&probabilities, 0.5);

    let options = SolveOptions {
        n_threads: 2,
        ..SolveOptions::default()
    };
    let labeling = solver.solve(&merged, &costs, &options)?;
    Ok((merged, labeling))
}

#[test]
fn strong_boundary_keeps_two_segments() -> anyhow::Result<()> {
    let labels = plane_labels();
    let signal = boundary_signal(0.9, 0.1);

    for solver in [Solver::Decomposition, Solver::KernighanLin] {
        let (graph, labeling) = run_pipeline(&labels, &signal, solver)?;
        assert_eq!(graph.nodes, vec![1, 2]);
        assert_eq!(labeling.len(), 2);
        assert_ne!(
            labeling[0], labeling[1],
            "a likely boundary must stay cut ({})",
            solver
        );
    }
    Ok(())
}

#[test]
fn weak_boundary_merges_into_one_segment() -> anyhow::Result<()> {
    let labels = plane_labels();
    let signal = boundary_signal(0.05, 0.05);

    for solver in [Solver::Decomposition, Solver::GreedyAdditive] {
        let (graph, labeling) = run_pipeline(&labels, &signal, solver)?;
        assert_eq!(graph.nodes, vec![1, 2]);
        assert_eq!(
            labeling[0], labeling[1],
            "a weak boundary must be merged away ({})",
            solver
        );
    }
    Ok(())
}

#[test]
fn block_outputs_are_idempotent_under_retry() -> anyhow::Result<()> {
    let labels = plane_labels();
    let blocks = compute_blocks(SHAPE, [3, 3, 2], [1, 1, 1], None)?;
    let store = MemoryStore::new();

    let graph = extract_block_graph(&labels, &blocks[0])?;
    store_block_graph(&store, blocks[0].block_id, &graph)?;
    let first: RegionGraph = store.get(&sub_graph_key(0, 0))?;

    // a retry overwrites only its own key and reproduces the same artifact
    store_block_graph(&store, blocks[0].block_id, &graph)?;
    let second: RegionGraph = store.get(&sub_graph_key(0, 0))?;
    assert_eq!(first, second);
    assert!(!store.exists(&sub_graph_key(0, 1)));
    Ok(())
}

#[test]
fn per_block_failures_are_reported_individually() -> anyhow::Result<()> {
    let blocks = compute_blocks([4, 4, 4], [4, 4, 2], [0, 0, 0], None)?;
    let executor = LocalExecutor::new(2);

    let runs = executor.run(&blocks, |block| {
        if block.block_id == 1 {
            Err(anyhow::anyhow!("unreadable region"))
        } else {
            Ok(block.block_id)
        }
    })?;

    assert_eq!(failed_block_ids(&runs), vec![1]);
    let succeeded: Vec<usize> = runs
        .iter()
        .filter_map(|run| run.result.as_ref().ok().copied())
        .collect();
    assert_eq!(succeeded, vec![0]);
    Ok(())
}

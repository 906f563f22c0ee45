use common::Buffer3;

use crate::blocking::compute_blocks;
use crate::config::FeatureConfig;
use crate::features::{accumulate_boundary_features, stat, EdgeFeatures};
use crate::merge::{merge_block_features, merge_block_graphs, MergeError};
use crate::rag::{extract_block_graph, extract_full_graph, Edge, RegionGraph};
use crate::volume::MemoryVolume;

/// Three slabs along x, boundaries at x = 1|2 and x = 3|4; each boundary is
/// owned by a different block of a [2, 2, 2] blocking.
fn three_slab_volume() -> MemoryVolume<u64> {
    let shape = [2, 2, 6];
    let mut labels = Buffer3::new_default(shape);
    for z in 0..shape[0] {
        for y in 0..shape[1] {
            for x in 0..shape[2] {
                *labels.get_mut([z, y, x]) = 1 + (x / 2) as u64;
            }
        }
    }
    MemoryVolume::new(labels)
}

#[test]
fn blockwise_merge_equals_full_extraction() -> anyhow::Result<()> {
    let labels = three_slab_volume();
    let blocks = compute_blocks([2, 2, 6], [2, 2, 2], [1, 1, 1], None)?;
    assert_eq!(blocks.len(), 3);

    let block_graphs: Vec<RegionGraph> = blocks
        .iter()
        .map(|block| extract_block_graph(&labels, block))
        .collect::<Result<_, _>>()?;
    let merged = merge_block_graphs(&block_graphs)?;

    let full = extract_full_graph(&labels)?;
    assert_eq!(merged, full);
    assert_eq!(merged.nodes, vec![1, 2, 3]);
    assert_eq!(merged.edges, vec![Edge::new(1, 2), Edge::new(2, 3)]);
    Ok(())
}

#[test]
fn merging_a_single_block_is_the_identity() -> anyhow::Result<()> {
    let labels = three_slab_volume();
    let blocks = compute_blocks([2, 2, 6], [2, 2, 6], [1, 1, 1], None)?;
    assert_eq!(blocks.len(), 1);

    let graph = extract_block_graph(&labels, &blocks[0])?;
    let merged = merge_block_graphs(std::slice::from_ref(&graph))?;
    assert_eq!(merged, extract_full_graph(&labels)?);
    Ok(())
}

#[test]
fn duplicate_edge_across_blocks_fails_loudly() {
    let a = RegionGraph::new(vec![1, 2], vec![Edge::new(1, 2)]);
    let b = RegionGraph::new(vec![1, 2, 3], vec![Edge::new(1, 2), Edge::new(2, 3)]);

    let result = merge_block_graphs(&[a, b]);
    assert!(matches!(
        result,
        Err(MergeError::EdgeOwnershipViolation {
            u: 1,
            v: 2,
            first_block: 0,
            second_block: 1,
        })
    ));
}

#[test]
fn feature_merge_places_rows_at_global_edge_indices() -> anyhow::Result<()> {
    let labels = three_slab_volume();
    let shape = [2, 2, 6];
    // boundary 1|2 reads 0.8, boundary 2|3 reads 0.2
    let mut signal = Buffer3::new_default(shape);
    for z in 0..shape[0] {
        for y in 0..shape[1] {
            for x in 0..shape[2] {
                *signal.get_mut([z, y, x]) = match x {
                    1 | 2 => 0.8f64,
                    3 | 4 => 0.2,
                    _ => 0.0,
                };
            }
        }
    }
    let signal = MemoryVolume::new(signal);

    let blocks = compute_blocks(shape, [2, 2, 2], [1, 1, 1], None)?;
    let config = FeatureConfig::boundary(shape);

    let mut graphs = Vec::new();
    let mut tables = Vec::new();
    for block in &blocks {
        let graph = extract_block_graph(&labels, block)?;
        let features =
            accumulate_boundary_features(block, &labels, &signal, &graph, &config)?;
        graphs.push(graph);
        tables.push(features);
    }

    let merged = merge_block_graphs(&graphs)?;
    let parts: Vec<(&RegionGraph, &EdgeFeatures)> =
        graphs.iter().zip(tables.iter()).collect();
    let features = merge_block_features(&merged, &parts)?;

    assert_eq!(features.n_edges(), 2);
    // edge order is sorted: (1, 2) then (2, 3)
    assert_eq!(features.value(0, 0, stat::MEAN), 0.8);
    assert!((features.value(1, 0, stat::MEAN) - 0.2).abs() < 1e-12);
    Ok(())
}

#[test]
fn missing_feature_rows_are_detected() -> anyhow::Result<()> {
    let labels = three_slab_volume();
    let shape = [2, 2, 6];
    let signal = MemoryVolume::from_vec(shape, vec![0.5f64; 24]);
    let blocks = compute_blocks(shape, [2, 2, 2], [1, 1, 1], None)?;
    let config = FeatureConfig::boundary(shape);

    let mut graphs = Vec::new();
    let mut tables = Vec::new();
    for block in &blocks {
        let graph = extract_block_graph(&labels, block)?;
        let features =
            accumulate_boundary_features(block, &labels, &signal, &graph, &config)?;
        graphs.push(graph);
        tables.push(features);
    }
    let merged = merge_block_graphs(&graphs)?;

    // drop the block owning edge (2, 3)
    let parts: Vec<(&RegionGraph, &EdgeFeatures)> = graphs
        .iter()
        .zip(tables.iter())
        .take(1)
        .collect();
    let result = merge_block_features(&merged, &parts);
    assert!(matches!(
        result,
        Err(MergeError::MissingFeatures { u: 2, v: 3 })
    ));
    Ok(())
}

#[test]
fn feature_rows_for_unknown_edges_are_rejected() {
    let merged = RegionGraph::new(vec![1, 2], vec![Edge::new(1, 2)]);
    let stray = RegionGraph::new(vec![1, 2, 9], vec![Edge::new(2, 9)]);
    let table = EdgeFeatures::new(1, 10);

    let result = merge_block_features(&merged, &[(&stray, &table)]);
    assert!(matches!(
        result,
        Err(MergeError::UnknownEdge { u: 2, v: 9, block: 0 })
    ));
}

#[test]
fn duplicate_feature_rows_violate_ownership() {
    let merged = RegionGraph::new(vec![1, 2], vec![Edge::new(1, 2)]);
    let part = RegionGraph::new(vec![1, 2], vec![Edge::new(1, 2)]);
    let table = EdgeFeatures::new(1, 10);

    let result = merge_block_features(&merged, &[(&part, &table), (&part, &table)]);
    assert!(matches!(
        result,
        Err(MergeError::EdgeOwnershipViolation {
            u: 1,
            v: 2,
            first_block: 0,
            second_block: 1,
        })
    ));
}

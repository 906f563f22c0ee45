use common::Buffer3;

use crate::blocking::compute_blocks;
use crate::rag::{extract_block_graph, extract_full_graph, Edge, RegionGraph};
use crate::volume::MemoryVolume;

/// Two regions split by a flat plane between x = 1 and x = 2.
fn two_region_volume() -> MemoryVolume<u64> {
    let shape = [2, 2, 4];
    let mut labels = Buffer3::new_default(shape);
    for z in 0..shape[0] {
        for y in 0..shape[1] {
            for x in 0..shape[2] {
                *labels.get_mut([z, y, x]) = if x < 2 { 1 } else { 2 };
            }
        }
    }
    MemoryVolume::new(labels)
}

#[test]
fn full_extraction_finds_the_seam_edge() -> anyhow::Result<()> {
    let labels = two_region_volume();
    let graph = extract_full_graph(&labels)?;

    assert_eq!(graph.nodes, vec![1, 2]);
    assert_eq!(graph.edges, vec![Edge::new(1, 2)]);
    graph.validate()?;
    Ok(())
}

#[test]
fn seam_edge_is_owned_by_exactly_one_block() -> anyhow::Result<()> {
    let labels = two_region_volume();
    let blocks = compute_blocks([2, 2, 4], [2, 2, 2], [1, 1, 1], None)?;
    assert_eq!(blocks.len(), 2);

    let lower = extract_block_graph(&labels, &blocks[0])?;
    let upper = extract_block_graph(&labels, &blocks[1])?;

    let seam = Edge::new(1, 2);
    let in_lower = lower.edges.contains(&seam);
    let in_upper = upper.edges.contains(&seam);
    assert!(
        in_lower ^ in_upper,
        "seam edge must be reported by exactly one side, lower: {}, upper: {}",
        in_lower,
        in_upper
    );

    // the side owning the pair's lower voxel reports it
    assert!(in_lower);
    // the halo still makes the neighbor label visible to the owning side
    assert_eq!(lower.nodes, vec![1, 2]);
    assert_eq!(upper.nodes, vec![2]);
    Ok(())
}

#[test]
fn background_only_block_yields_a_valid_empty_graph() -> anyhow::Result<()> {
    let labels = MemoryVolume::from_vec([2, 2, 2], vec![0; 8]);
    let graph = extract_full_graph(&labels)?;
    assert!(graph.nodes.is_empty());
    assert!(graph.edges.is_empty());
    graph.validate()?;
    Ok(())
}

#[test]
fn background_never_produces_nodes_or_edges() -> anyhow::Result<()> {
    // label 1 surrounded by background
    let labels = MemoryVolume::from_vec([1, 1, 3], vec![0, 1, 0]);
    let graph = extract_full_graph(&labels)?;
    assert_eq!(graph.nodes, vec![1]);
    assert!(graph.edges.is_empty());
    Ok(())
}

#[test]
fn rerunning_a_block_is_idempotent() -> anyhow::Result<()> {
    let labels = two_region_volume();
    let blocks = compute_blocks([2, 2, 4], [2, 2, 2], [1, 1, 1], None)?;

    let first = extract_block_graph(&labels, &blocks[0])?;
    let second = extract_block_graph(&labels, &blocks[0])?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn validate_rejects_background_node_and_dangling_edges() {
    let with_zero = RegionGraph::new(vec![0, 1], vec![]);
    assert!(with_zero.validate().is_err());

    let dangling = RegionGraph::new(vec![1, 2], vec![Edge::new(1, 3)]);
    assert!(dangling.validate().is_err());
}

#[test]
#[should_panic(expected = "self edges are not allowed")]
fn self_edges_are_rejected() {
    Edge::new(3, 3);
}

#[test]
fn edge_normalizes_endpoint_order() {
    assert_eq!(Edge::new(5, 2), Edge::new(2, 5));
    let edge = Edge::new(5, 2);
    assert!(edge.u < edge.v);
}

use common::Buffer3;

use crate::blocking::{compute_blocks, Blocking, BlockingError};

#[test]
fn inner_bounds_cover_volume_exactly() -> anyhow::Result<()> {
    let shape = [10, 9, 8];
    let blocks = compute_blocks(shape, [4, 3, 5], [0, 0, 0], None)?;

    let mut coverage: Buffer3<u32> = Buffer3::new_default(shape);
    for block in &blocks {
        for p in block.inner.iter() {
            *coverage.get_mut(p) += 1;
        }
    }
    assert!(
        coverage.iter().all(|&c| c == 1),
        "every voxel must be owned by exactly one block"
    );
    Ok(())
}

#[test]
fn block_ids_are_dense_and_row_major() -> anyhow::Result<()> {
    let blocks = compute_blocks([10, 9, 8], [4, 3, 5], [0, 0, 0], None)?;

    let blocking = Blocking::new([10, 9, 8], [4, 3, 5])?;
    assert_eq!(blocking.grid(), [3, 3, 2]);
    assert_eq!(blocks.len(), blocking.n_blocks());
    for (index, block) in blocks.iter().enumerate() {
        assert_eq!(block.block_id, index);
    }

    // last axis fastest
    assert_eq!(blocks[0].inner.begin, [0, 0, 0]);
    assert_eq!(blocks[1].inner.begin, [0, 0, 5]);
    assert_eq!(blocks[2].inner.begin, [0, 3, 0]);
    Ok(())
}

#[test]
fn trailing_blocks_are_clipped_to_volume() -> anyhow::Result<()> {
    let blocks = compute_blocks([10, 9, 8], [4, 3, 5], [0, 0, 0], None)?;
    let last = blocks.last().unwrap();
    assert_eq!(last.inner.begin, [8, 6, 5]);
    assert_eq!(last.inner.end, [10, 9, 8]);
    Ok(())
}

#[test]
fn outer_bounds_expand_by_halo_and_clip() -> anyhow::Result<()> {
    let blocks = compute_blocks([10, 9, 8], [4, 3, 5], [1, 2, 1], None)?;

    let first = &blocks[0];
    assert_eq!(first.outer.begin, [0, 0, 0]);
    assert_eq!(first.outer.end, [5, 5, 6]);

    let last = blocks.last().unwrap();
    assert_eq!(last.outer.begin, [7, 4, 4]);
    assert_eq!(last.outer.end, [10, 9, 8]);
    Ok(())
}

#[test]
fn roi_filters_and_clips_blocks() -> anyhow::Result<()> {
    let blocks = compute_blocks([8, 8, 8], [4, 4, 4], [0, 0, 0], Some(([2, 2, 2], [6, 6, 6])))?;

    // all 8 grid blocks intersect the roi and keep their full-grid ids
    assert_eq!(blocks.len(), 8);
    assert_eq!(blocks[0].block_id, 0);
    assert_eq!(blocks[0].inner.begin, [2, 2, 2]);
    assert_eq!(blocks[0].inner.end, [4, 4, 4]);

    let corner = compute_blocks([8, 8, 8], [4, 4, 4], [0, 0, 0], Some(([0, 0, 0], [4, 4, 4])))?;
    assert_eq!(corner.len(), 1);
    assert_eq!(corner[0].block_id, 0);
    Ok(())
}

#[test]
fn zero_block_shape_is_rejected() {
    let result = compute_blocks([8, 8, 8], [4, 0, 4], [0, 0, 0], None);
    assert!(matches!(result, Err(BlockingError::ZeroBlockShape(_))));
}

#[test]
fn roi_outside_volume_is_rejected() {
    let result = compute_blocks([8, 8, 8], [4, 4, 4], [0, 0, 0], Some(([0, 0, 0], [9, 8, 8])));
    assert!(matches!(result, Err(BlockingError::RoiOutOfBounds { .. })));
}

#[test]
fn blocking_is_deterministic_across_runs() -> anyhow::Result<()> {
    let a = compute_blocks([13, 7, 5], [4, 4, 4], [1, 1, 1], None)?;
    let b = compute_blocks([13, 7, 5], [4, 4, 4], [1, 1, 1], None)?;
    assert_eq!(a, b);
    Ok(())
}

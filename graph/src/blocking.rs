use serde::{Deserialize, Serialize};
use thiserror::Error;

use common::Bounds3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlockingError {
    #[error("Block shape must be positive on every axis, got {0:?}")]
    ZeroBlockShape([usize; 3]),
    #[error("Roi {begin:?}..{end:?} does not fit into volume shape {shape:?}")]
    RoiOutOfBounds {
        begin: [usize; 3],
        end: [usize; 3],
        shape: [usize; 3],
    },
    #[error("Block id {block_id} out of range, grid has {n_blocks} blocks")]
    BlockIdOutOfRange { block_id: usize, n_blocks: usize },
}

pub type BlockingResult<T> = Result<T, BlockingError>;

/// A spatial sub-region of the volume: the inner bounds are owned exclusively
/// by this block, the outer bounds add the halo, clipped to the volume.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub block_id: usize,
    pub inner: Bounds3,
    pub outer: Bounds3,
}

/// Deterministic decomposition of a volume into a grid of blocks.
///
/// Block ids are a dense 0-based range in row-major grid order (last axis
/// fastest), stable across runs for the same `(shape, block_shape)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Blocking {
    shape: [usize; 3],
    block_shape: [usize; 3],
    grid: [usize; 3],
}

impl Blocking {
    pub fn new(shape: [usize; 3], block_shape: [usize; 3]) -> BlockingResult<Self> {
        if block_shape.iter().any(|&b| b == 0) {
            return Err(BlockingError::ZeroBlockShape(block_shape));
        }
        let grid = [
            shape[0].div_ceil(block_shape[0]),
            shape[1].div_ceil(block_shape[1]),
            shape[2].div_ceil(block_shape[2]),
        ];
        Ok(Self {
            shape,
            block_shape,
            grid,
        })
    }

    #[inline]
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    #[inline]
    pub fn n_blocks(&self) -> usize {
        self.grid[0] * self.grid[1] * self.grid[2]
    }

    #[inline]
    pub fn grid(&self) -> [usize; 3] {
        self.grid
    }

    pub fn block_at(&self, block_id: usize, halo: [usize; 3]) -> BlockingResult<Block> {
        let n_blocks = self.n_blocks();
        if block_id >= n_blocks {
            return Err(BlockingError::BlockIdOutOfRange { block_id, n_blocks });
        }
        let g2 = block_id % self.grid[2];
        let g1 = (block_id / self.grid[2]) % self.grid[1];
        let g0 = block_id / (self.grid[2] * self.grid[1]);
        let grid_pos = [g0, g1, g2];

        let mut begin = [0usize; 3];
        let mut end = [0usize; 3];
        for a in 0..3 {
            begin[a] = grid_pos[a] * self.block_shape[a];
            end[a] = (begin[a] + self.block_shape[a]).min(self.shape[a]);
        }
        let inner = Bounds3::new(begin, end);
        Ok(Block {
            block_id,
            inner,
            outer: inner.expanded(halo, self.shape),
        })
    }
}

/// Computes the ordered block list for a volume.
///
/// With a region of interest only blocks intersecting it are returned, their
/// inner bounds additionally clipped to the roi; block ids keep their full-grid
/// values so retries stay keyed consistently across runs.
pub fn compute_blocks(
    volume_shape: [usize; 3],
    block_shape: [usize; 3],
    halo: [usize; 3],
    roi: Option<([usize; 3], [usize; 3])>,
) -> BlockingResult<Vec<Block>> {
    let blocking = Blocking::new(volume_shape, block_shape)?;

    let roi_bounds = match roi {
        Some((begin, end)) => {
            let valid = (0..3).all(|a| begin[a] <= end[a] && end[a] <= volume_shape[a]);
            if !valid {
                return Err(BlockingError::RoiOutOfBounds {
                    begin,
                    end,
                    shape: volume_shape,
                });
            }
            Some(Bounds3::new(begin, end))
        }
        None => None,
    };

    let mut blocks = Vec::with_capacity(blocking.n_blocks());
    for block_id in 0..blocking.n_blocks() {
        let mut block = blocking.block_at(block_id, halo)?;
        if let Some(roi_bounds) = &roi_bounds {
            match block.inner.intersection(roi_bounds) {
                Some(clipped) => {
                    block.inner = clipped;
                    block.outer = clipped.expanded(halo, volume_shape);
                }
                None => continue,
            }
        }
        blocks.push(block);
    }
    Ok(blocks)
}

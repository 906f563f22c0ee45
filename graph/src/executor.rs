//! Block-level fan-out: a pure per-block function composed with an injected
//! executor, instead of binding domain logic to one execution backend.
//!
//! Blocks share no mutable state and each writes only its own keyed output
//! slot, so the only synchronization point is "all blocks done". Failed
//! blocks are reported individually for selective retry.

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::blocking::Block;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Outcome of one block's run. Errors are carried as rendered strings so the
/// report stays independent of the work function's error type.
#[derive(Debug)]
pub struct BlockRun<T> {
    pub block_id: usize,
    pub result: Result<T, String>,
}

/// Runs a pure block function over a block list on a bounded local pool.
///
/// Batch-scheduler backends are collaborators implementing the same contract
/// out of process.
#[derive(Debug, Clone, Copy)]
pub struct LocalExecutor {
    n_jobs: usize,
}

impl LocalExecutor {
    pub fn new(n_jobs: usize) -> Self {
        Self {
            n_jobs: n_jobs.max(1),
        }
    }

    pub fn run<T, E, F>(&self, blocks: &[Block], run_block: F) -> ExecutorResult<Vec<BlockRun<T>>>
    where
        T: Send,
        E: std::fmt::Display,
        F: Fn(&Block) -> Result<T, E> + Sync,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.n_jobs.min(blocks.len().max(1)))
            .build()?;

        let runs: Vec<BlockRun<T>> = pool.install(|| {
            blocks
                .par_iter()
                .map(|block| {
                    debug!(block_id = block.block_id, "start processing block");
                    let result = match run_block(block) {
                        Ok(value) => {
                            debug!(block_id = block.block_id, "processed block");
                            Ok(value)
                        }
                        Err(e) => {
                            error!(block_id = block.block_id, "block failed: {}", e);
                            Err(e.to_string())
                        }
                    };
                    BlockRun {
                        block_id: block.block_id,
                        result,
                    }
                })
                .collect()
        });

        let n_failed = runs.iter().filter(|run| run.result.is_err()).count();
        info!(
            n_blocks = runs.len(),
            n_failed, "finished block fan-out"
        );
        Ok(runs)
    }
}

/// Block ids whose runs failed, for selective retry.
pub fn failed_block_ids<T>(runs: &[BlockRun<T>]) -> Vec<usize> {
    runs.iter()
        .filter(|run| run.result.is_err())
        .map(|run| run.block_id)
        .collect()
}

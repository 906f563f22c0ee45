use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use common::{Bounds3, Buffer3};

use crate::blocking::Block;
use crate::config::{AccumulationMode, ConfigError, FeatureConfig};
use crate::rag::{scan_window, Edge, RegionGraph};
use crate::store::{BlockStore, BlockStoreExt, StoreError};
use crate::volume::{VolumeError, VolumeSource, VolumeSource4};

/// Per-channel statistics layout of a feature row.
pub mod stat {
    pub const MEAN: usize = 0;
    pub const VARIANCE: usize = 1;
    pub const MIN: usize = 2;
    pub const Q10: usize = 3;
    pub const Q25: usize = 4;
    pub const MEDIAN: usize = 5;
    pub const Q75: usize = 6;
    pub const Q90: usize = 7;
    pub const MAX: usize = 8;
    pub const COUNT: usize = 9;
}

pub const STAT_COLUMNS: usize = 10;

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to read sub-volume: {0}")]
    Volume(#[from] VolumeError),
    #[error("Failed to persist block features: {0}")]
    Store(#[from] StoreError),
    #[error("Configured mode {mode:?} does not accept a {given} signal")]
    ModeMismatch {
        mode: AccumulationMode,
        given: &'static str,
    },
    #[error("Signal shape {signal:?} does not match label shape {labels:?}")]
    ShapeMismatch {
        labels: [usize; 3],
        signal: [usize; 3],
    },
    #[error("Signal has {got} channels but {expected} offsets are configured")]
    ChannelArity { expected: usize, got: usize },
    #[error("Edge ({u}, {v}) received no feature contributions")]
    MissingCoverage { u: u64, v: u64 },
}

pub type FeatureResult<T> = Result<T, FeatureError>;

/// Row-major per-edge feature table with a fixed per-run width.
#[derive(Clone, Default, PartialEq, Debug, Serialize, Deserialize)]
pub struct EdgeFeatures {
    n_edges: usize,
    width: usize,
    data: Vec<f64>,
}

impl EdgeFeatures {
    pub fn new(n_edges: usize, width: usize) -> Self {
        Self {
            n_edges,
            width,
            data: vec![0.0; n_edges * width],
        }
    }

    #[inline]
    pub fn n_edges(&self) -> usize {
        self.n_edges
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn row(&self, edge: usize) -> &[f64] {
        &self.data[edge * self.width..(edge + 1) * self.width]
    }

    #[inline]
    pub fn row_mut(&mut self, edge: usize) -> &mut [f64] {
        &mut self.data[edge * self.width..(edge + 1) * self.width]
    }

    /// Statistic `column` of accumulation channel `channel` for `edge`.
    #[inline]
    pub fn value(&self, edge: usize, channel: usize, column: usize) -> f64 {
        debug_assert!(column < STAT_COLUMNS);
        self.row(edge)[channel * STAT_COLUMNS + column]
    }
}

/// Feature width for a configuration: fixed for the whole run.
pub fn feature_width(config: &FeatureConfig) -> FeatureResult<usize> {
    Ok(config.n_channels()? * STAT_COLUMNS)
}

fn quantile(sorted: &[f64], fraction: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let position = fraction * (sorted.len() - 1) as f64;
    let lo = position.floor() as usize;
    let hi = position.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let t = position - lo as f64;
        sorted[lo] * (1.0 - t) + sorted[hi] * t
    }
}

fn write_stats(values: &mut [f64], out: &mut [f64]) {
    if values.is_empty() {
        return;
    }
    let count = values.len() as f64;
    let mean = values.iter().sum::<f64>() / count;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / count;
    values.sort_unstable_by(f64::total_cmp);

    out[stat::MEAN] = mean;
    out[stat::VARIANCE] = variance;
    out[stat::MIN] = values[0];
    out[stat::Q10] = quantile(values, 0.1);
    out[stat::Q25] = quantile(values, 0.25);
    out[stat::MEDIAN] = quantile(values, 0.5);
    out[stat::Q75] = quantile(values, 0.75);
    out[stat::Q90] = quantile(values, 0.9);
    out[stat::MAX] = values[values.len() - 1];
    out[stat::COUNT] = count;
}

#[inline]
fn to_f64<T: ToPrimitive>(value: T) -> f64 {
    value
        .to_f64()
        .expect("signal value must be representable as f64")
}

/// Walks every 6-neighbor pair of distinct non-zero labels whose lower voxel
/// lies in the block's inner region, the same origination rule the sub-graph
/// extractor uses.
fn for_each_owned_pair(
    inner: &Bounds3,
    window: &Bounds3,
    label_buf: &Buffer3<u64>,
    mut visit: impl FnMut([usize; 3], [usize; 3], u64, u64),
) {
    let window_shape = window.shape();
    for p in window.iter() {
        if !inner.contains(p) {
            continue;
        }
        let lp = window.local(p);
        let label = *label_buf.get(lp);
        if label == 0 {
            continue;
        }
        for axis in 0..3 {
            let mut lq = lp;
            lq[axis] += 1;
            if lq[axis] >= window_shape[axis] {
                continue;
            }
            let other = *label_buf.get(lq);
            if other != 0 && other != label {
                visit(lp, lq, label, other);
            }
        }
    }
}

fn finalize(
    graph: &RegionGraph,
    mut accumulated: Vec<Vec<Vec<f64>>>,
) -> FeatureResult<EdgeFeatures> {
    let n_channels = accumulated.len();
    let mut features = EdgeFeatures::new(graph.n_edges(), n_channels * STAT_COLUMNS);
    for edge in 0..graph.n_edges() {
        let mut total = 0usize;
        for channel in 0..n_channels {
            let values = &mut accumulated[channel][edge];
            total += values.len();
            let row = features.row_mut(edge);
            write_stats(
                values,
                &mut row[channel * STAT_COLUMNS..(channel + 1) * STAT_COLUMNS],
            );
        }
        if total == 0 {
            let Edge { u, v } = graph.edges[edge];
            return Err(FeatureError::MissingCoverage { u, v });
        }
    }
    Ok(features)
}

/// Accumulates per-edge statistics from a dense 3-D signal, either straight
/// off the boundary map or off filter responses, depending on the config.
pub fn accumulate_boundary_features<T, L, S>(
    block: &Block,
    labels: &L,
    signal: &S,
    graph: &RegionGraph,
    config: &FeatureConfig,
) -> FeatureResult<EdgeFeatures>
where
    T: Copy + ToPrimitive,
    L: VolumeSource<u64> + ?Sized,
    S: VolumeSource<T> + ?Sized,
{
    config.validate()?;
    let mode = config.mode();
    if mode == AccumulationMode::Affinity {
        return Err(FeatureError::ModeMismatch {
            mode,
            given: "dense 3-d",
        });
    }
    let volume_shape = labels.shape();
    if signal.shape() != volume_shape {
        return Err(FeatureError::ShapeMismatch {
            labels: volume_shape,
            signal: signal.shape(),
        });
    }

    let window = scan_window(&block.inner, volume_shape);
    let label_buf = labels.read(&window)?;
    let edge_index = graph.edge_index();

    match mode {
        AccumulationMode::Boundary => {
            let signal_buf = signal.read(&window)?;
            let mut accumulated = vec![vec![Vec::new(); graph.n_edges()]; 1];
            for_each_owned_pair(&block.inner, &window, &label_buf, |lp, lq, u, v| {
                if let Some(&edge) = edge_index.get(&Edge::new(u, v)) {
                    accumulated[0][edge].push(to_f64(*signal_buf.get(lp)));
                    accumulated[0][edge].push(to_f64(*signal_buf.get(lq)));
                }
            });
            finalize(graph, accumulated)
        }
        AccumulationMode::Filtered => {
            // filters need context beyond the scan window to avoid seam artifacts
            let filter_window = Bounds3::new(
                [
                    block.outer.begin[0].min(window.begin[0]),
                    block.outer.begin[1].min(window.begin[1]),
                    block.outer.begin[2].min(window.begin[2]),
                ],
                [
                    block.outer.end[0].max(window.end[0]),
                    block.outer.end[1].max(window.end[1]),
                    block.outer.end[2].max(window.end[2]),
                ],
            );
            let raw = signal.read(&filter_window)?;
            let raw = Buffer3::new(
                raw.shape(),
                raw.iter().map(|&v| to_f64(v) as f32).collect(),
            );

            let pairs = config.filter_pairs()?;
            let mut accumulated = vec![vec![Vec::new(); graph.n_edges()]; pairs.len()];
            for (channel, (filter, sigma)) in pairs.iter().enumerate() {
                let response = filter.apply(&raw, *sigma);
                for_each_owned_pair(&block.inner, &window, &label_buf, |lp, lq, u, v| {
                    if let Some(&edge) = edge_index.get(&Edge::new(u, v)) {
                        let gp = [
                            window.begin[0] + lp[0] - filter_window.begin[0],
                            window.begin[1] + lp[1] - filter_window.begin[1],
                            window.begin[2] + lp[2] - filter_window.begin[2],
                        ];
                        let gq = [
                            window.begin[0] + lq[0] - filter_window.begin[0],
                            window.begin[1] + lq[1] - filter_window.begin[1],
                            window.begin[2] + lq[2] - filter_window.begin[2],
                        ];
                        accumulated[channel][edge].push(*response.get(gp) as f64);
                        accumulated[channel][edge].push(*response.get(gq) as f64);
                    }
                });
            }
            finalize(graph, accumulated)
        }
        AccumulationMode::Affinity => unreachable!(),
    }
}

/// Accumulates per-edge statistics from a 4-D affinity stack: channel `c`
/// holds the affinity between a voxel and its neighbor at `offsets[c]`, and
/// contributes the value at the source voxel to the pair's edge.
pub fn accumulate_affinity_features<T, L, S>(
    block: &Block,
    labels: &L,
    signal: &S,
    graph: &RegionGraph,
    config: &FeatureConfig,
) -> FeatureResult<EdgeFeatures>
where
    T: Copy + ToPrimitive,
    L: VolumeSource<u64> + ?Sized,
    S: VolumeSource4<T> + ?Sized,
{
    config.validate()?;
    let mode = config.mode();
    if mode != AccumulationMode::Affinity {
        return Err(FeatureError::ModeMismatch {
            mode,
            given: "offset-stacked 4-d",
        });
    }
    let offsets = config.offsets.as_ref().expect("affinity mode has offsets");
    if signal.n_channels() != offsets.len() {
        return Err(FeatureError::ChannelArity {
            expected: offsets.len(),
            got: signal.n_channels(),
        });
    }
    let volume_shape = labels.shape();
    if signal.shape() != volume_shape {
        return Err(FeatureError::ShapeMismatch {
            labels: volume_shape,
            signal: signal.shape(),
        });
    }

    let mut reach = [0usize; 3];
    for offset in offsets {
        for a in 0..3 {
            reach[a] = reach[a].max(offset[a].unsigned_abs() as usize);
        }
    }
    let label_window = block.inner.expanded(reach, volume_shape);
    let label_buf = labels.read(&label_window)?;
    let edge_index = graph.edge_index();

    let mut accumulated = vec![vec![Vec::new(); graph.n_edges()]; offsets.len()];
    for (channel, offset) in offsets.iter().enumerate() {
        let signal_buf = signal.read_channel(channel, &block.inner)?;
        for p in block.inner.iter() {
            let label = *label_buf.get(label_window.local(p));
            if label == 0 {
                continue;
            }
            let mut q = [0usize; 3];
            let mut inside = true;
            for a in 0..3 {
                let c = p[a] as i64 + offset[a];
                if c < 0 || c as usize >= volume_shape[a] {
                    inside = false;
                    break;
                }
                q[a] = c as usize;
            }
            if !inside {
                continue;
            }
            let other = *label_buf.get(label_window.local(q));
            if other == 0 || other == label {
                continue;
            }
            if let Some(&edge) = edge_index.get(&Edge::new(label, other)) {
                accumulated[channel][edge]
                    .push(to_f64(*signal_buf.get(block.inner.local(p))));
            }
        }
    }
    finalize(graph, accumulated)
}

pub fn store_block_features(
    store: &dyn BlockStore,
    block_id: usize,
    features: &EdgeFeatures,
) -> Result<(), StoreError> {
    store.put(&crate::store::features_key(0, block_id), features)
}

pub fn load_block_features(
    store: &dyn BlockStore,
    block_id: usize,
) -> Result<EdgeFeatures, StoreError> {
    store.get(&crate::store::features_key(0, block_id))
}

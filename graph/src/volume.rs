use thiserror::Error;

use common::{Bounds3, Buffer3};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VolumeError {
    #[error("Region {begin:?}..{end:?} is outside the volume shape {shape:?}")]
    OutOfBounds {
        begin: [usize; 3],
        end: [usize; 3],
        shape: [usize; 3],
    },
    #[error("Channel {channel} out of range, volume has {n_channels} channels")]
    ChannelOutOfRange { channel: usize, n_channels: usize },
}

pub type VolumeResult<T> = Result<T, VolumeError>;

/// Read access to a contiguous sub-region of a dense 3-D volume.
///
/// The chunked on-disk format behind this trait is a collaborator concern;
/// implementations must return exactly the requested region without loading
/// the whole dataset.
pub trait VolumeSource<T>: Sync {
    fn shape(&self) -> [usize; 3];

    fn read(&self, bounds: &Bounds3) -> VolumeResult<Buffer3<T>>;
}

/// Read access to a 4-D volume with a leading channel axis, one dense 3-D
/// volume per channel (affinity maps: one channel per spatial offset).
pub trait VolumeSource4<T>: Sync {
    fn shape(&self) -> [usize; 3];

    fn n_channels(&self) -> usize;

    fn read_channel(&self, channel: usize, bounds: &Bounds3) -> VolumeResult<Buffer3<T>>;
}

/// In-memory volume, used for local runs and tests.
#[derive(Debug, Clone)]
pub struct MemoryVolume<T> {
    data: Buffer3<T>,
}

impl<T: Copy> MemoryVolume<T> {
    pub fn new(data: Buffer3<T>) -> Self {
        Self { data }
    }

    pub fn from_vec(shape: [usize; 3], voxels: Vec<T>) -> Self {
        Self {
            data: Buffer3::new(shape, voxels),
        }
    }
}

fn check_bounds(bounds: &Bounds3, shape: [usize; 3]) -> VolumeResult<()> {
    if (0..3).any(|a| bounds.end[a] > shape[a]) {
        return Err(VolumeError::OutOfBounds {
            begin: bounds.begin,
            end: bounds.end,
            shape,
        });
    }
    Ok(())
}

fn copy_region<T: Copy>(data: &Buffer3<T>, bounds: &Bounds3) -> Buffer3<T> {
    let shape = bounds.shape();
    let mut out = Vec::with_capacity(bounds.num_elements());
    for z in bounds.begin[0]..bounds.end[0] {
        for y in bounds.begin[1]..bounds.end[1] {
            let row_start = data.index([z, y, bounds.begin[2]]);
            out.extend_from_slice(&data.voxels()[row_start..row_start + shape[2]]);
        }
    }
    Buffer3::new(shape, out)
}

impl<T: Copy + Sync + Send> VolumeSource<T> for MemoryVolume<T> {
    fn shape(&self) -> [usize; 3] {
        self.data.shape()
    }

    fn read(&self, bounds: &Bounds3) -> VolumeResult<Buffer3<T>> {
        check_bounds(bounds, self.data.shape())?;
        Ok(copy_region(&self.data, bounds))
    }
}

/// In-memory 4-D volume: a stack of equally shaped channels.
#[derive(Debug, Clone)]
pub struct MemoryVolume4<T> {
    channels: Vec<Buffer3<T>>,
}

impl<T: Copy> MemoryVolume4<T> {
    pub fn new(channels: Vec<Buffer3<T>>) -> Self {
        assert!(!channels.is_empty(), "need at least one channel");
        let shape = channels[0].shape();
        assert!(
            channels.iter().all(|c| c.shape() == shape),
            "all channels must share one shape"
        );
        Self { channels }
    }
}

impl<T: Copy + Sync + Send> VolumeSource4<T> for MemoryVolume4<T> {
    fn shape(&self) -> [usize; 3] {
        self.channels[0].shape()
    }

    fn n_channels(&self) -> usize {
        self.channels.len()
    }

    fn read_channel(&self, channel: usize, bounds: &Bounds3) -> VolumeResult<Buffer3<T>> {
        if channel >= self.channels.len() {
            return Err(VolumeError::ChannelOutOfRange {
                channel,
                n_channels: self.channels.len(),
            });
        }
        check_bounds(bounds, self.channels[channel].shape())?;
        Ok(copy_region(&self.channels[channel], bounds))
    }
}

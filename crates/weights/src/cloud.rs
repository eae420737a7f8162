//! Read-only view over a sequence of geometry samples.

use glam::Vec3;

use crate::chunk::Chunk;
use crate::sample::{GeometrySample, PoseSpace};

/// A point cloud the fallback engine can query.
///
/// Implemented by a single [`Chunk`] and by the merged cloud. Sample order
/// is stable and is what nearest-neighbor ties resolve against.
pub trait SampleCloud: Sync {
    fn len(&self) -> usize;

    fn sample(&self, index: usize) -> &GeometrySample;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All sample positions in `space`, in cloud order.
    fn positions(&self, space: PoseSpace) -> Vec<Vec3> {
        (0..self.len())
            .map(|index| self.sample(index).position(space))
            .collect()
    }

    /// Whether every sample carries pre-deformed data.
    fn has_pre_deformed(&self) -> bool {
        (0..self.len()).all(|index| self.sample(index).pre_deformed.is_some())
    }
}

impl SampleCloud for Chunk {
    fn len(&self) -> usize {
        self.num_samples()
    }

    fn sample(&self, index: usize) -> &GeometrySample {
        &self.samples()[index]
    }
}

//! The merged cloud: every retained chunk's samples in one sequence.

use std::sync::Arc;

use crate::chunk::Chunk;
use crate::cloud::SampleCloud;
use crate::sample::GeometrySample;
use crate::skeleton::Skeleton;

/// Position of one sample inside the merged cloud.
#[derive(Debug, Clone)]
pub struct MergedSample {
    pub chunk: Arc<Chunk>,
    /// Index into the owning chunk's samples
    pub sample: usize,
}

impl MergedSample {
    pub fn geometry(&self) -> &GeometrySample {
        &self.chunk.samples()[self.sample]
    }

    pub fn owner(&self) -> &str {
        self.chunk.mesh_name()
    }
}

/// Concatenation of all retained chunks' samples, in store order.
///
/// Derived on demand and never persisted. Its skeleton is the union of the
/// chunks' skeletons, with the first definition of each influence kept.
#[derive(Debug, Clone, Default)]
pub struct MergedCloud {
    entries: Vec<MergedSample>,
    skeleton: Skeleton,
}

impl MergedCloud {
    pub fn new(chunks: &[Arc<Chunk>]) -> Self {
        let total = chunks.iter().map(|chunk| chunk.num_samples()).sum();
        let mut entries = Vec::with_capacity(total);
        let mut skeleton = Skeleton::default();

        for chunk in chunks {
            skeleton.extend_union(chunk.skeleton());
            entries.extend((0..chunk.num_samples()).map(|sample| MergedSample {
                chunk: Arc::clone(chunk),
                sample,
            }));
        }

        Self { entries, skeleton }
    }

    /// Name of the chunk that contributed sample `index`.
    pub fn owner(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(MergedSample::owner)
    }

    pub fn entries(&self) -> &[MergedSample] {
        &self.entries
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    /// Distinct contributing mesh names, sorted.
    pub fn mesh_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.iter().map(MergedSample::owner).collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

impl SampleCloud for MergedCloud {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn sample(&self, index: usize) -> &GeometrySample {
        self.entries[index].geometry()
    }
}

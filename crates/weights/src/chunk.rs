//! Captured skin data for a single source mesh.
//!
//! A [`Chunk`] is built once at export time (see [`crate::capture`]),
//! persisted, and read back at import time. It is never mutated in place:
//! the only derived form is a copy stamped with the container path it was
//! written to.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use skinner_config::WEIGHT_SUM_TOLERANCE;

use crate::error::ChunkError;
use crate::sample::GeometrySample;
use crate::skeleton::Skeleton;

/// Strip DAG path (`|`) and namespace (`:`) prefixes from a node name.
pub fn leaf_name(name: &str) -> &str {
    let leaf = name.rsplit('|').next().unwrap_or(name);
    leaf.rsplit(':').next().unwrap_or(leaf)
}

/// Skinning method in effect on the source mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum SkinningMethod {
    #[default]
    Linear = 0,
    DualQuaternion = 1,
    WeightBlended = 2,
}

impl SkinningMethod {
    /// Map a host enum value; invalid (negative or unknown) values read as linear.
    pub fn from_index(index: i32) -> Self {
        match index {
            1 => Self::DualQuaternion,
            2 => Self::WeightBlended,
            _ => Self::Linear,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Linear => "classic linear",
            Self::DualQuaternion => "dual quaternion",
            Self::WeightBlended => "weight blended",
        }
    }

    pub fn uses_blend_weights(&self) -> bool {
        matches!(self, Self::WeightBlended)
    }
}

/// Sampled vertex adjacency used to verify vertex order between meshes
/// with the same vertex count.
///
/// Maps every `step`-th vertex index to its sorted connected vertices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NeighborSignature(BTreeMap<u32, Vec<u32>>);

impl NeighborSignature {
    /// Sample `samples` vertices evenly from `adjacency` (indexed by vertex).
    pub fn sample(adjacency: &[Vec<u32>], samples: usize) -> Self {
        let vertex_count = adjacency.len();
        if vertex_count == 0 || samples == 0 {
            return Self::default();
        }

        let mut step = vertex_count / samples;
        if step == 0 {
            step = vertex_count - 1;
        }
        let step = step.max(1);

        let signature = (0..vertex_count)
            .step_by(step)
            .map(|index| (index as u32, sorted_neighbors(&adjacency[index])))
            .collect();
        Self(signature)
    }

    /// Whether `adjacency` reproduces every sampled neighbor list.
    pub fn matches(&self, adjacency: &[Vec<u32>]) -> bool {
        self.0.iter().all(|(&index, stored)| {
            adjacency
                .get(index as usize)
                .is_some_and(|current| sorted_neighbors(current) == *stored)
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn sorted_neighbors(neighbors: &[u32]) -> Vec<u32> {
    let mut sorted = neighbors.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
}

/// Everything needed to assemble a [`Chunk`].
#[derive(Debug, Clone)]
pub struct ChunkParts {
    pub mesh_name: String,
    pub mesh_vertex_count: u32,
    pub indices: Vec<u32>,
    pub samples: Vec<GeometrySample>,
    pub skeleton: Skeleton,
    pub skinning_method: SkinningMethod,
    pub neighbor_signature: NeighborSignature,
    pub at_bind_pose: bool,
    /// Capture time in milliseconds since the Unix epoch
    pub captured_at_ms: u64,
    pub author: String,
    pub tool_version: String,
}

/// Immutable point cloud of skin information for one source mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    mesh_name: String,
    mesh_vertex_count: u32,
    indices: Vec<u32>,
    samples: Vec<GeometrySample>,
    skeleton: Skeleton,
    skinning_method: SkinningMethod,
    #[serde(default)]
    neighbor_signature: NeighborSignature,
    at_bind_pose: bool,
    captured_at_ms: u64,
    author: String,
    tool_version: String,
    #[serde(default)]
    file_path: Option<String>,
}

impl Chunk {
    /// Assemble and validate a chunk. The mesh name is reduced to its leaf name.
    pub fn from_parts(parts: ChunkParts) -> Result<Self, ChunkError> {
        let chunk = Self {
            mesh_name: leaf_name(&parts.mesh_name).to_string(),
            mesh_vertex_count: parts.mesh_vertex_count,
            indices: parts.indices,
            samples: parts.samples,
            skeleton: parts.skeleton,
            skinning_method: parts.skinning_method,
            neighbor_signature: parts.neighbor_signature,
            at_bind_pose: parts.at_bind_pose,
            captured_at_ms: parts.captured_at_ms,
            author: parts.author,
            tool_version: parts.tool_version,
            file_path: None,
        };
        chunk.validate()?;
        Ok(chunk)
    }

    /// Reduce a stored mesh name to its leaf name.
    pub(crate) fn into_leaf_named(mut self) -> Self {
        let leaf = leaf_name(&self.mesh_name);
        if leaf.len() != self.mesh_name.len() {
            self.mesh_name = leaf.to_string();
        }
        self
    }

    /// Copy of this chunk recording the container it was written to.
    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Check every chunk and sample invariant.
    ///
    /// Deserialized chunks are not validated automatically; the chunk store
    /// runs this before accepting them.
    pub fn validate(&self) -> Result<(), ChunkError> {
        let mesh = &self.mesh_name;
        if mesh.is_empty() {
            return Err(ChunkError::EmptyMeshName);
        }
        if self.indices.len() != self.samples.len() {
            return Err(ChunkError::LengthMismatch {
                mesh: mesh.clone(),
                indices: self.indices.len(),
                samples: self.samples.len(),
            });
        }
        if self.samples.is_empty() {
            return Err(ChunkError::NoSamples { mesh: mesh.clone() });
        }

        self.skeleton.validate()?;

        let mut seen = HashSet::with_capacity(self.indices.len());
        let mut max_index = None;
        for (position, (&index, sample)) in self.indices.iter().zip(&self.samples).enumerate() {
            if !seen.insert(index) {
                return Err(ChunkError::DuplicateIndex {
                    mesh: mesh.clone(),
                    index,
                });
            }
            max_index = max_index.max(Some(index));

            if sample.source_index != index {
                return Err(ChunkError::IndexMismatch {
                    mesh: mesh.clone(),
                    position,
                    expected: index,
                    found: sample.source_index,
                });
            }
            self.validate_sample(sample)?;
        }

        if let Some(max_index) = max_index {
            if u64::from(self.mesh_vertex_count) < u64::from(max_index) + 1 {
                return Err(ChunkError::VertexCountTooSmall {
                    mesh: mesh.clone(),
                    vertex_count: self.mesh_vertex_count,
                    max_index,
                });
            }
        }

        Ok(())
    }

    fn validate_sample(&self, sample: &GeometrySample) -> Result<(), ChunkError> {
        let mesh = &self.mesh_name;
        let vertex = sample.source_index;

        if sample.weights.is_empty() {
            return Err(ChunkError::EmptyWeights {
                mesh: mesh.clone(),
                vertex,
            });
        }
        for (influence, weight) in sample.weights.iter() {
            if !(0.0..=1.0 + WEIGHT_SUM_TOLERANCE).contains(&weight) {
                return Err(ChunkError::WeightOutOfRange {
                    mesh: mesh.clone(),
                    vertex,
                    influence: influence.to_string(),
                    weight,
                });
            }
            if !self.skeleton.contains(influence) {
                return Err(ChunkError::UnknownInfluence {
                    mesh: mesh.clone(),
                    vertex,
                    influence: influence.to_string(),
                });
            }
        }
        let sum = sample.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ChunkError::WeightSum {
                mesh: mesh.clone(),
                vertex,
                sum,
            });
        }
        if let Some(value) = sample.blend_weight {
            if !(0.0..=1.0).contains(&value) {
                return Err(ChunkError::BlendWeightOutOfRange {
                    mesh: mesh.clone(),
                    vertex,
                    value,
                });
            }
        }
        Ok(())
    }

    /// Leaf name of the source mesh.
    pub fn mesh_name(&self) -> &str {
        &self.mesh_name
    }

    /// Total vertex count of the source mesh at capture time.
    pub fn mesh_vertex_count(&self) -> u32 {
        self.mesh_vertex_count
    }

    /// Captured vertex indices, parallel to [`Chunk::samples`].
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn samples(&self) -> &[GeometrySample] {
        &self.samples
    }

    /// Number of captured samples (may be fewer than the mesh vertex count).
    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn skinning_method(&self) -> SkinningMethod {
        self.skinning_method
    }

    pub fn neighbor_signature(&self) -> &NeighborSignature {
        &self.neighbor_signature
    }

    pub fn at_bind_pose(&self) -> bool {
        self.at_bind_pose
    }

    pub fn captured_at_ms(&self) -> u64 {
        self.captured_at_ms
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn tool_version(&self) -> &str {
        &self.tool_version
    }

    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref()
    }

    pub fn has_pre_deformed_data(&self) -> bool {
        self.samples.iter().any(|sample| sample.pre_deformed.is_some())
    }

    pub fn has_influence(&self, name: &str) -> bool {
        self.skeleton.contains(leaf_name(name))
    }

    /// The influence carrying every sample, if each sample has exactly one
    /// non-zero weight and it is the same influence throughout.
    pub fn single_influence(&self) -> Option<&str> {
        let mut samples = self.samples.iter();
        let first = samples.next()?.weights.sole_influence()?;
        samples
            .all(|sample| sample.weights.sole_influence() == Some(first))
            .then_some(first)
    }

    /// Map from captured vertex index to sample position.
    pub fn index_lookup(&self) -> HashMap<u32, usize> {
        self.indices
            .iter()
            .enumerate()
            .map(|(position, &index)| (index, position))
            .collect()
    }

    /// Sample captured for vertex `index`, if any.
    pub fn sample_for_index(&self, index: u32) -> Option<&GeometrySample> {
        self.indices
            .iter()
            .position(|&captured| captured == index)
            .map(|position| &self.samples[position])
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mesh: '{}'", self.mesh_name)?;
        writeln!(f, "Generated with version: {}", self.tool_version)?;
        writeln!(f, "Captured at (ms): {}", self.captured_at_ms)?;
        writeln!(f, "Imported from: {}", self.file_path.as_deref().unwrap_or("<unsaved>"))?;
        writeln!(f, "Author: '{}'", self.author)?;
        writeln!(f, "Has pre-deformed data: {}", self.has_pre_deformed_data())?;
        writeln!(f, "At bind pose: {}", self.at_bind_pose)?;
        writeln!(f, "Skinning method: '{}'", self.skinning_method.label())?;
        writeln!(f, "Mesh vertex count: {}", self.mesh_vertex_count)?;
        writeln!(f, "Captured vertices: {}", self.samples.len())?;
        writeln!(f, "Neighbor samples: {}", self.neighbor_signature.len())?;
        let mut influences: Vec<&str> = self.skeleton.names().collect();
        influences.sort_unstable();
        write!(f, "Influences ({}): {:?}", influences.len(), influences)
    }
}

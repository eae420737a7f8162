//! Export-side construction of chunks from a live mesh query.

use glam::Vec3;
use std::time::{SystemTime, UNIX_EPOCH};

use skinner_config::ExportConfig;

use crate::chunk::{Chunk, ChunkParts, NeighborSignature, SkinningMethod, leaf_name};
use crate::error::ChunkError;
use crate::influence::InfluenceWeights;
use crate::sample::{GeometrySample, PoseData};
use crate::skeleton::{Influence, Skeleton};

/// Version string recorded in every captured chunk.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// One vertex as reported by the capture source.
#[derive(Debug, Clone)]
pub struct CapturedVertex {
    pub index: u32,
    pub position: Vec3,
    pub normal: Vec3,
    /// Rest-pose position/normal, when the mesh is deformed away from its bind pose
    pub pre_deformed: Option<PoseData>,
    /// Weights keyed by influence name (paths and namespaces are stripped)
    pub weights: InfluenceWeights,
    pub blend_weight: Option<f32>,
}

/// Everything the capture source reports for one skinned mesh.
#[derive(Debug, Clone)]
pub struct MeshCapture {
    pub mesh_name: String,
    pub vertex_count: u32,
    pub vertices: Vec<CapturedVertex>,
    pub skeleton: Vec<Influence>,
    pub skinning_method: SkinningMethod,
    pub at_bind_pose: bool,
    /// Full mesh adjacency indexed by vertex, used for the neighbor signature
    pub adjacency: Option<Vec<Vec<u32>>>,
}

/// Provenance stamped on chunks captured in one export.
#[derive(Debug, Clone)]
pub struct CaptureMeta {
    pub captured_at_ms: u64,
    pub author: String,
}

impl CaptureMeta {
    /// Current time and the user running the process.
    pub fn now() -> Self {
        let captured_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0);
        let author = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "Unknown".to_string());
        Self {
            captured_at_ms,
            author,
        }
    }
}

/// Build a validated chunk from a mesh capture.
///
/// Pre-deformed data is only kept when the mesh was captured away from
/// its bind pose, and blend weights only for weight-blended skinning.
pub fn capture_chunk(
    capture: &MeshCapture,
    meta: &CaptureMeta,
    config: &ExportConfig,
) -> Result<Chunk, ChunkError> {
    let keep_pre_deformed = !capture.at_bind_pose;
    let keep_blend = capture.skinning_method.uses_blend_weights();

    let mut indices = Vec::with_capacity(capture.vertices.len());
    let mut samples = Vec::with_capacity(capture.vertices.len());
    for vertex in &capture.vertices {
        let weights: InfluenceWeights = vertex
            .weights
            .iter()
            .map(|(name, weight)| (leaf_name(name).to_string(), weight))
            .collect();

        let mut sample = GeometrySample::new(vertex.index, vertex.position, vertex.normal, weights);
        if keep_pre_deformed {
            sample.pre_deformed = vertex.pre_deformed;
        }
        if keep_blend {
            sample.blend_weight = vertex.blend_weight;
        }
        indices.push(vertex.index);
        samples.push(sample);
    }

    let influences = capture
        .skeleton
        .iter()
        .map(|influence| {
            let mut influence = influence.clone();
            influence.name = leaf_name(&influence.name).to_string();
            influence.parent = influence.parent.map(|parent| leaf_name(&parent).to_string());
            influence
        })
        .collect();

    let neighbor_signature = capture
        .adjacency
        .as_deref()
        .map(|adjacency| NeighborSignature::sample(adjacency, config.neighbor_samples))
        .unwrap_or_default();

    Chunk::from_parts(ChunkParts {
        mesh_name: capture.mesh_name.clone(),
        mesh_vertex_count: capture.vertex_count,
        indices,
        samples,
        skeleton: Skeleton::new(influences)?,
        skinning_method: capture.skinning_method,
        neighbor_signature,
        at_bind_pose: capture.at_bind_pose,
        captured_at_ms: meta.captured_at_ms,
        author: meta.author.clone(),
        tool_version: TOOL_VERSION.to_string(),
    })
}

/// Capture every mesh, failing the whole export if any one is malformed.
pub fn capture_chunks(
    captures: &[MeshCapture],
    meta: &CaptureMeta,
    config: &ExportConfig,
) -> Result<Vec<Chunk>, ChunkError> {
    captures
        .iter()
        .map(|capture| capture_chunk(capture, meta, config))
        .collect()
}

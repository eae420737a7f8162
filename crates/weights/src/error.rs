//! Error types for chunk construction and validation.

/// A chunk (or a sample inside it) violates a data model invariant.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChunkError {
    #[error("Chunk has an empty mesh name")]
    EmptyMeshName,
    #[error("Chunk '{mesh}' captures no vertices")]
    NoSamples { mesh: String },
    #[error("Chunk '{mesh}' has {indices} vertex indices but {samples} samples")]
    LengthMismatch {
        mesh: String,
        indices: usize,
        samples: usize,
    },
    #[error("Chunk '{mesh}' captures vertex {index} more than once")]
    DuplicateIndex { mesh: String, index: u32 },
    #[error("Chunk '{mesh}' declares {vertex_count} vertices but captures index {max_index}")]
    VertexCountTooSmall {
        mesh: String,
        vertex_count: u32,
        max_index: u32,
    },
    #[error("Sample {position} of '{mesh}' records vertex {found}, expected {expected}")]
    IndexMismatch {
        mesh: String,
        position: usize,
        expected: u32,
        found: u32,
    },
    #[error("Vertex {vertex} of '{mesh}' has no influence weights")]
    EmptyWeights { mesh: String, vertex: u32 },
    #[error("Vertex {vertex} of '{mesh}' has weight {weight} on '{influence}' outside [0, 1]")]
    WeightOutOfRange {
        mesh: String,
        vertex: u32,
        influence: String,
        weight: f32,
    },
    #[error("Vertex {vertex} of '{mesh}' has weights summing to {sum}")]
    WeightSum { mesh: String, vertex: u32, sum: f32 },
    #[error("Vertex {vertex} of '{mesh}' has blend weight {value} outside [0, 1]")]
    BlendWeightOutOfRange { mesh: String, vertex: u32, value: f32 },
    #[error(
        "Vertex {vertex} of '{mesh}' references influence '{influence}' missing from the skeleton"
    )]
    UnknownInfluence {
        mesh: String,
        vertex: u32,
        influence: String,
    },
    #[error("Duplicate influence leaf name: {0}")]
    DuplicateInfluence(String),
}

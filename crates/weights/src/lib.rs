//! Skinner weight data - captured skin point clouds and their stores
//!
//! This crate provides the data model shared by export and import:
//! - [`influence::InfluenceWeights`] - Per-vertex influence-to-weight mapping
//! - [`sample::GeometrySample`] - One captured vertex (pose data + weights)
//! - [`skeleton::Skeleton`] - Influence joints recorded with a chunk
//! - [`chunk::Chunk`] - Immutable capture of one source mesh
//! - [`capture`] - Building chunks from a live mesh query
//! - [`store::ChunkStore`] - Recency-merged chunks keyed by mesh leaf name
//! - [`merged::MergedCloud`] - Every retained sample as one point cloud
//! - [`storage`] - Chunk containers (JSON files, in-memory)

pub mod capture;
pub mod chunk;
pub mod cloud;
pub mod error;
pub mod influence;
pub mod merged;
pub mod sample;
pub mod skeleton;
pub mod storage;
pub mod store;

pub use capture::{CaptureMeta, CapturedVertex, MeshCapture, capture_chunk, capture_chunks};
pub use chunk::{Chunk, ChunkParts, NeighborSignature, SkinningMethod, leaf_name};
pub use cloud::SampleCloud;
pub use error::ChunkError;
pub use influence::{InfluenceWeights, normalize_to_one};
pub use merged::{MergedCloud, MergedSample};
pub use sample::{GeometrySample, PoseData, PoseSpace};
pub use skeleton::{Influence, LocalTransform, RotateOrder, Skeleton};
pub use storage::{ChunkRepository, JsonFileRepository, MemoryRepository, StorageError, load_store};
pub use store::{ChunkStore, RejectedChunk};

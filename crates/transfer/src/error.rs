//! Error types for weight import and export.

use skinner_config::ConfigError;
use weights::{ChunkError, StorageError};

/// Failure importing one destination mesh (or loading the batch inputs).
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("No chunks available to import from")]
    NoChunks,
    #[error("Destination mesh '{0}' has no vertices")]
    EmptyDestination(String),
    #[error("Destination mesh '{mesh}' is malformed: {reason}")]
    MalformedDestination { mesh: String, reason: String },
    #[error("Chunk matching '{mesh}' is malformed: {source}")]
    MalformedChunk {
        mesh: String,
        #[source]
        source: ChunkError,
    },
    #[error("Chunk '{chunk}' has no sample for vertex {index} of '{mesh}'")]
    MissingSample {
        mesh: String,
        chunk: String,
        index: u32,
    },
    #[error("No samples to interpolate '{mesh}' from {source_name}")]
    EmptyCloud { mesh: String, source_name: String },
    #[error("Failed to load chunks: {0}")]
    Storage(#[from] StorageError),
    #[error("Applying weights to '{mesh}' failed: {reason}")]
    Applier { mesh: String, reason: String },
}

/// Failure capturing or saving chunks.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Invalid export configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Capture failed: {0}")]
    Chunk(#[from] ChunkError),
    #[error("Failed to save chunks: {0}")]
    Storage(#[from] StorageError),
}

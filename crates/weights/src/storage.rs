//! Persistence of chunk sequences to named containers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, info};

use crate::chunk::Chunk;
use crate::store::ChunkStore;

/// Current container layout version.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Container not found: {0}")]
    MissingContainer(String),
    #[error("Container is read-only: {0}")]
    ReadOnly(String),
    #[error("Container '{container}' has format version {found}, newer than supported {supported}")]
    UnsupportedVersion {
        container: String,
        found: u32,
        supported: u32,
    },
    #[error("Repository lock poisoned")]
    LockPoisoned,
}

/// Opaque read/write of an ordered chunk sequence by container name.
pub trait ChunkRepository: Send + Sync {
    /// Read every chunk in `container`, in stored order.
    fn read(&self, container: &str) -> Result<Vec<Chunk>, StorageError>;

    /// Replace the contents of `container`.
    ///
    /// Returns the chunks as stored, each stamped with the container path.
    fn write(&self, container: &str, chunks: &[Chunk]) -> Result<Vec<Chunk>, StorageError>;
}

/// On-disk layout of one container.
#[derive(Debug, Serialize, Deserialize)]
struct ChunkFile {
    format_version: u32,
    chunks: Vec<Chunk>,
}

/// One JSON file per container, resolved under a root directory.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    root: PathBuf,
}

impl JsonFileRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing `container`; a missing extension defaults to `.json`.
    pub fn path_for(&self, container: &str) -> PathBuf {
        let mut path = self.root.join(container);
        if path.extension().is_none() {
            path.set_extension("json");
        }
        path
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl ChunkRepository for JsonFileRepository {
    fn read(&self, container: &str) -> Result<Vec<Chunk>, StorageError> {
        let path = self.path_for(container);
        if !path.exists() {
            return Err(StorageError::MissingContainer(path.display().to_string()));
        }

        let text = fs::read_to_string(&path).map_err(io_error(&path))?;
        let file: ChunkFile = serde_json::from_str(&text)?;
        if file.format_version > FORMAT_VERSION {
            return Err(StorageError::UnsupportedVersion {
                container: container.to_string(),
                found: file.format_version,
                supported: FORMAT_VERSION,
            });
        }

        let location = path.display().to_string();
        info!("Loaded {} chunks from {}", file.chunks.len(), location);
        Ok(file
            .chunks
            .into_iter()
            .map(|chunk| chunk.with_file_path(location.clone()))
            .collect())
    }

    fn write(&self, container: &str, chunks: &[Chunk]) -> Result<Vec<Chunk>, StorageError> {
        let path = self.path_for(container);
        if let Ok(metadata) = fs::metadata(&path) {
            if metadata.permissions().readonly() {
                return Err(StorageError::ReadOnly(path.display().to_string()));
            }
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }

        let location = path.display().to_string();
        let stamped: Vec<Chunk> = chunks
            .iter()
            .cloned()
            .map(|chunk| chunk.with_file_path(location.clone()))
            .collect();
        let file = ChunkFile {
            format_version: FORMAT_VERSION,
            chunks: stamped,
        };
        let text = serde_json::to_string_pretty(&file)?;
        fs::write(&path, text).map_err(io_error(&path))?;

        info!("Saved {} chunks to {}", file.chunks.len(), location);
        Ok(file.chunks)
    }
}

/// Thread-safe in-memory repository.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    containers: RwLock<HashMap<String, Vec<Chunk>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all stored containers, sorted.
    pub fn containers(&self) -> Result<Vec<String>, StorageError> {
        let containers = self.containers.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut names: Vec<String> = containers.keys().cloned().collect();
        names.sort_unstable();
        Ok(names)
    }
}

impl ChunkRepository for MemoryRepository {
    fn read(&self, container: &str) -> Result<Vec<Chunk>, StorageError> {
        let containers = self.containers.read().map_err(|_| StorageError::LockPoisoned)?;
        containers
            .get(container)
            .cloned()
            .ok_or_else(|| StorageError::MissingContainer(container.to_string()))
    }

    fn write(&self, container: &str, chunks: &[Chunk]) -> Result<Vec<Chunk>, StorageError> {
        let stamped: Vec<Chunk> = chunks
            .iter()
            .cloned()
            .map(|chunk| chunk.with_file_path(container))
            .collect();
        let mut containers = self.containers.write().map_err(|_| StorageError::LockPoisoned)?;
        containers.insert(container.to_string(), stamped.clone());
        debug!("Stored {} chunks in memory container '{}'", stamped.len(), container);
        Ok(stamped)
    }
}

/// Read `containers` in order and merge them by recency.
pub fn load_store<R, S>(repository: &R, containers: &[S]) -> Result<ChunkStore, StorageError>
where
    R: ChunkRepository + ?Sized,
    S: AsRef<str>,
{
    let sources = containers
        .iter()
        .map(|container| repository.read(container.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ChunkStore::build(sources))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{ChunkParts, NeighborSignature, SkinningMethod};
    use crate::influence::InfluenceWeights;
    use crate::sample::GeometrySample;
    use crate::skeleton::{Influence, Skeleton};
    use glam::Vec3;

    fn chunk(name: &str, captured_at_ms: u64) -> Chunk {
        Chunk::from_parts(ChunkParts {
            mesh_name: name.to_string(),
            mesh_vertex_count: 2,
            indices: vec![0, 1],
            samples: vec![
                GeometrySample::new(0, Vec3::ZERO, Vec3::Y, InfluenceWeights::single("root"))
                    .with_pre_deformed(Vec3::X, Vec3::Y),
                GeometrySample::new(1, Vec3::X, Vec3::Y, InfluenceWeights::single("root"))
                    .with_pre_deformed(Vec3::Y, Vec3::Y),
            ],
            skeleton: Skeleton::new(vec![Influence::new("root")]).unwrap(),
            skinning_method: SkinningMethod::DualQuaternion,
            neighbor_signature: NeighborSignature::sample(&[vec![1], vec![0]], 10),
            at_bind_pose: false,
            captured_at_ms,
            author: "a".to_string(),
            tool_version: "0.1.0".to_string(),
        })
        .unwrap()
    }

    fn temp_root(name: &str) -> PathBuf {
        let root = std::env::temp_dir()
            .join(format!("skinner-storage-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&root);
        root
    }

    #[test]
    fn test_json_round_trip() {
        let root = temp_root("round-trip");
        let repo = JsonFileRepository::new(&root);
        let written = repo.write("nested/skin", &[chunk("body", 1)]).unwrap();
        assert!(written[0].file_path().unwrap().ends_with("skin.json"));

        let read = repo.read("nested/skin").unwrap();
        assert_eq!(read, written);
        assert_eq!(read[0].neighbor_signature().len(), 2);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_missing_container() {
        let repo = JsonFileRepository::new(temp_root("missing"));
        assert!(matches!(repo.read("nothing"), Err(StorageError::MissingContainer(_))));
        assert!(matches!(
            MemoryRepository::new().read("nothing"),
            Err(StorageError::MissingContainer(_))
        ));
    }

    #[test]
    fn test_load_store_merges_containers() {
        let repo = MemoryRepository::new();
        repo.write("a", &[chunk("body", 5), chunk("arm", 1)]).unwrap();
        repo.write("b", &[chunk("body", 9)]).unwrap();

        let store = load_store(&repo, &["b", "a"]).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("body").unwrap().captured_at_ms(), 9);
        assert_eq!(store.get("body").unwrap().file_path(), Some("b"));
        assert_eq!(repo.containers().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }
}

//! Recency-based selection of one chunk per mesh name.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::chunk::{Chunk, leaf_name};
use crate::error::ChunkError;
use crate::merged::MergedCloud;

/// A chunk excluded from the store because it failed validation.
#[derive(Debug, Clone)]
pub struct RejectedChunk {
    pub mesh_name: String,
    pub error: ChunkError,
}

/// The winning chunk for every mesh name across all loaded sources.
///
/// Built fresh for each import from explicit inputs. For a name collision
/// the chunk with the later capture timestamp is kept; equal timestamps go
/// to the chunk seen last. A winner keeps the slot where its name first
/// appeared, so store order is stable across replacements.
#[derive(Debug, Default)]
pub struct ChunkStore {
    chunks: Vec<Arc<Chunk>>,
    by_name: HashMap<String, usize>,
    rejected: Vec<RejectedChunk>,
}

impl ChunkStore {
    /// Merge any number of chunk sequences, in the order given.
    pub fn build<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: IntoIterator<Item = Chunk>,
    {
        let mut store = Self::default();
        for source in sources {
            for chunk in source {
                store.offer(chunk);
            }
        }
        debug!(
            "Chunk store built: {} chunks retained, {} rejected",
            store.chunks.len(),
            store.rejected.len()
        );
        store
    }

    pub fn from_chunks(chunks: impl IntoIterator<Item = Chunk>) -> Self {
        Self::build([chunks])
    }

    fn offer(&mut self, chunk: Chunk) {
        let chunk = chunk.into_leaf_named();
        if let Err(error) = chunk.validate() {
            warn!("Rejecting malformed chunk '{}': {}", chunk.mesh_name(), error);
            self.rejected.push(RejectedChunk {
                mesh_name: chunk.mesh_name().to_string(),
                error,
            });
            return;
        }

        let name = chunk.mesh_name().to_string();
        match self.by_name.get(&name) {
            Some(&slot) => {
                let existing = &self.chunks[slot];
                if chunk.captured_at_ms() >= existing.captured_at_ms() {
                    debug!(
                        "Replacing older chunk '{}' ({} ms) with newer capture ({} ms)",
                        name,
                        existing.captured_at_ms(),
                        chunk.captured_at_ms()
                    );
                    self.chunks[slot] = Arc::new(chunk);
                } else {
                    debug!(
                        "Ignoring older chunk '{}' ({} ms), keeping capture at {} ms",
                        name,
                        chunk.captured_at_ms(),
                        existing.captured_at_ms()
                    );
                }
            }
            None => {
                self.by_name.insert(name, self.chunks.len());
                self.chunks.push(Arc::new(chunk));
            }
        }
    }

    /// Chunk for `name`; paths and namespaces are stripped before lookup.
    pub fn get(&self, name: &str) -> Option<&Arc<Chunk>> {
        self.by_name
            .get(leaf_name(name))
            .map(|&slot| &self.chunks[slot])
    }

    /// Most recent rejection recorded for `name`.
    pub fn rejection(&self, name: &str) -> Option<&RejectedChunk> {
        let leaf = leaf_name(name);
        self.rejected.iter().rev().find(|rejected| rejected.mesh_name == leaf)
    }

    pub fn rejected(&self) -> &[RejectedChunk] {
        &self.rejected
    }

    pub fn chunks(&self) -> &[Arc<Chunk>] {
        &self.chunks
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Chunk>> {
        self.chunks.iter()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Retained mesh names, in store order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.chunks.iter().map(|chunk| chunk.mesh_name())
    }

    /// Build the merged cloud over every retained chunk.
    pub fn merged_cloud(&self) -> MergedCloud {
        MergedCloud::new(&self.chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{ChunkParts, NeighborSignature, SkinningMethod};
    use crate::cloud::SampleCloud;
    use crate::influence::InfluenceWeights;
    use crate::sample::GeometrySample;
    use crate::skeleton::{Influence, Skeleton};
    use glam::Vec3;

    fn chunk(name: &str, captured_at_ms: u64, author: &str) -> Chunk {
        Chunk::from_parts(ChunkParts {
            mesh_name: name.to_string(),
            mesh_vertex_count: 1,
            indices: vec![0],
            samples: vec![GeometrySample::new(
                0,
                Vec3::ZERO,
                Vec3::Y,
                InfluenceWeights::single("root"),
            )],
            skeleton: Skeleton::new(vec![Influence::new("root")]).unwrap(),
            skinning_method: SkinningMethod::Linear,
            neighbor_signature: NeighborSignature::default(),
            at_bind_pose: true,
            captured_at_ms,
            author: author.to_string(),
            tool_version: String::new(),
        })
        .unwrap()
    }

    fn decoded(name: &str, indices: &[u32]) -> Chunk {
        let json = serde_json::json!({
            "mesh_name": name,
            "mesh_vertex_count": 2,
            "indices": indices,
            "samples": [],
            "skeleton": { "influences": [] },
            "skinning_method": "Linear",
            "at_bind_pose": true,
            "captured_at_ms": 99,
            "author": "",
            "tool_version": ""
        });
        serde_json::from_value(json).unwrap()
    }

    fn malformed(name: &str) -> Chunk {
        decoded(name, &[0, 1])
    }

    #[test]
    fn test_newest_chunk_wins_regardless_of_order() {
        let forward = ChunkStore::build([
            vec![chunk("body", 10, "old")],
            vec![chunk("body", 20, "new")],
        ]);
        let reverse = ChunkStore::build([
            vec![chunk("body", 20, "new")],
            vec![chunk("body", 10, "old")],
        ]);
        for store in [forward, reverse] {
            assert_eq!(store.len(), 1);
            assert_eq!(store.get("body").unwrap().author(), "new");
        }
    }

    #[test]
    fn test_equal_timestamps_last_seen_wins() {
        let store =
            ChunkStore::from_chunks([chunk("body", 5, "first"), chunk("body", 5, "second")]);
        assert_eq!(store.get("body").unwrap().author(), "second");
    }

    #[test]
    fn test_replacement_keeps_first_slot() {
        let store = ChunkStore::from_chunks([
            chunk("arm", 1, ""),
            chunk("leg", 1, ""),
            chunk("arm", 2, "newer"),
        ]);
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["arm", "leg"]);
        assert_eq!(store.merged_cloud().len(), 2);
    }

    #[test]
    fn test_lookup_uses_leaf_name() {
        let store = ChunkStore::from_chunks([chunk("body", 1, "")]);
        assert!(store.get("|char|ns:body").is_some());
        assert!(store.get("head").is_none());
    }

    #[test]
    fn test_malformed_chunks_are_rejected() {
        let store = ChunkStore::from_chunks([malformed("hat"), chunk("body", 1, "")]);
        assert_eq!(store.len(), 1);
        assert!(store.get("hat").is_none());
        let rejection = store.rejection("hat").unwrap();
        assert!(matches!(rejection.error, ChunkError::LengthMismatch { .. }));
    }

    #[test]
    fn test_decoded_chunk_names_are_reduced_to_leaf() {
        let mut json = serde_json::to_value(chunk("body", 3, "decoded")).unwrap();
        json["mesh_name"] = serde_json::json!("|grp|ns:body");
        let decoded_chunk: Chunk = serde_json::from_value(json).unwrap();

        let store = ChunkStore::from_chunks([decoded_chunk, chunk("body", 1, "older")]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["body"]);
        assert_eq!(store.get("body").unwrap().author(), "decoded");

        let store = ChunkStore::from_chunks([decoded("|grp|hat", &[])]);
        assert!(matches!(
            &store.rejection("hat").unwrap().error,
            ChunkError::NoSamples { mesh } if mesh == "hat"
        ));
    }
}

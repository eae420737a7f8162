//! Choosing an import strategy for each destination mesh.
//!
//! [`resolve`] walks a fixed precedence and returns the first plan that
//! applies:
//!
//! 1. forced merged cloud (`use_uber_chunk`)
//! 2. name match with a single influence
//! 3. name match with identical topology
//! 4. name match with differing topology (fallback on that chunk)
//! 5. a unique count/order match among the other chunks
//! 6. fallback on the merged cloud

use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use skinner_config::ImportConfig;
use weights::{Chunk, ChunkStore};

use crate::destination::DestinationMesh;
use crate::error::ImportError;

/// How a 1:1 chunk was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Name,
    VertexCountOrder,
}

/// Cloud a fallback plan interpolates from.
#[derive(Debug, Clone)]
pub enum FallbackCloud {
    /// Samples of the name-matched chunk
    Chunk(Arc<Chunk>),
    /// Every retained chunk's samples
    Merged,
}

/// Why a mesh was routed to interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// Name matched but vertex count, order or captured subset differ
    TopologyMismatch,
    /// No chunk with this name and no unique count/order match
    NoMatch,
    /// Several chunks share the destination's vertex count
    AmbiguousCountOrder(usize),
    /// Name matching disabled by configuration
    ForcedMergedCloud,
}

impl FallbackReason {
    pub fn describe(&self) -> String {
        match self {
            Self::TopologyMismatch => "topology differs from the matching chunk".to_string(),
            Self::NoMatch => "no matching chunk".to_string(),
            Self::AmbiguousCountOrder(count) => {
                format!("{} chunks share the vertex count", count)
            }
            Self::ForcedMergedCloud => "merged cloud forced".to_string(),
        }
    }
}

/// Strategy chosen for one destination mesh.
#[derive(Debug, Clone)]
pub enum ImportPlan {
    DirectSingleInfluence {
        chunk: Arc<Chunk>,
        influence: String,
    },
    DirectByIndex {
        chunk: Arc<Chunk>,
        matched_by: MatchKind,
    },
    Fallback {
        cloud: FallbackCloud,
        use_normal_filter: bool,
        use_merged_cloud: bool,
        reason: FallbackReason,
    },
}

/// Plan variant without its payload, for grouping and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlanKind {
    DirectSingleInfluence,
    DirectByIndex,
    FallbackChunk,
    FallbackMerged,
}

impl PlanKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::DirectSingleInfluence => "Single influence",
            Self::DirectByIndex => "By index",
            Self::FallbackChunk => "Fallback on matching chunk",
            Self::FallbackMerged => "Fallback on merged cloud",
        }
    }
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl ImportPlan {
    pub fn kind(&self) -> PlanKind {
        match self {
            Self::DirectSingleInfluence { .. } => PlanKind::DirectSingleInfluence,
            Self::DirectByIndex { .. } => PlanKind::DirectByIndex,
            Self::Fallback {
                cloud: FallbackCloud::Chunk(_),
                ..
            } => PlanKind::FallbackChunk,
            Self::Fallback {
                cloud: FallbackCloud::Merged,
                ..
            } => PlanKind::FallbackMerged,
        }
    }

    /// Chunk the plan reads from, if it is tied to one.
    pub fn chunk(&self) -> Option<&Arc<Chunk>> {
        match self {
            Self::DirectSingleInfluence { chunk, .. } | Self::DirectByIndex { chunk, .. } => {
                Some(chunk)
            }
            Self::Fallback {
                cloud: FallbackCloud::Chunk(chunk),
                ..
            } => Some(chunk),
            Self::Fallback { .. } => None,
        }
    }

    /// Human-readable source of the weights.
    pub fn source(&self) -> String {
        match self.chunk() {
            Some(chunk) => format!("'{}'", chunk.mesh_name()),
            None => "merged cloud".to_string(),
        }
    }
}

fn fallback(config: &ImportConfig, cloud: FallbackCloud, reason: FallbackReason) -> ImportPlan {
    let use_merged_cloud = matches!(cloud, FallbackCloud::Merged);
    ImportPlan::Fallback {
        cloud,
        use_normal_filter: config.use_normal_filter,
        use_merged_cloud,
        reason,
    }
}

/// Whether `chunk` can be copied onto `mesh` vertex by vertex.
///
/// Requires equal vertex counts, a matching neighbor signature when one was
/// recorded (which needs destination adjacency), and a captured sample for
/// every requested vertex.
pub fn topology_matches(chunk: &Chunk, mesh: &DestinationMesh) -> bool {
    if chunk.mesh_vertex_count() != mesh.vertex_count {
        return false;
    }

    let signature = chunk.neighbor_signature();
    if !signature.is_empty() {
        match &mesh.adjacency {
            Some(adjacency) if signature.matches(adjacency) => {}
            _ => return false,
        }
    }

    let lookup = chunk.index_lookup();
    mesh.vertices.iter().all(|vertex| lookup.contains_key(&vertex.index))
}

/// Decide the import plan for `mesh`.
pub fn resolve(
    mesh: &DestinationMesh,
    store: &ChunkStore,
    config: &ImportConfig,
) -> Result<ImportPlan, ImportError> {
    let name = mesh.leaf_name();
    let named = store.get(name);

    if named.is_none() {
        if let Some(rejected) = store.rejection(name) {
            return Err(ImportError::MalformedChunk {
                mesh: mesh.name.clone(),
                source: rejected.error.clone(),
            });
        }
    }
    if store.is_empty() {
        return Err(ImportError::NoChunks);
    }

    if config.forces_merged_cloud() {
        return Ok(fallback(config, FallbackCloud::Merged, FallbackReason::ForcedMergedCloud));
    }

    if let Some(chunk) = named {
        if let Some(influence) = chunk.single_influence() {
            return Ok(ImportPlan::DirectSingleInfluence {
                chunk: Arc::clone(chunk),
                influence: influence.to_string(),
            });
        }
        if topology_matches(chunk, mesh) {
            return Ok(ImportPlan::DirectByIndex {
                chunk: Arc::clone(chunk),
                matched_by: MatchKind::Name,
            });
        }
        return Ok(fallback(
            config,
            FallbackCloud::Chunk(Arc::clone(chunk)),
            FallbackReason::TopologyMismatch,
        ));
    }

    if config.count_order_enabled() {
        let same_count: Vec<&Arc<Chunk>> = store
            .iter()
            .filter(|chunk| chunk.mesh_vertex_count() == mesh.vertex_count)
            .collect();

        match same_count.as_slice() {
            [] => {}
            [chunk] => {
                // Without a recorded signature the vertex order cannot be verified
                if !chunk.neighbor_signature().is_empty() && topology_matches(chunk, mesh) {
                    return Ok(ImportPlan::DirectByIndex {
                        chunk: Arc::clone(chunk),
                        matched_by: MatchKind::VertexCountOrder,
                    });
                }
                debug!(
                    "'{}' shares a vertex count with '{}' but vertex order differs",
                    mesh.name,
                    chunk.mesh_name()
                );
            }
            several => {
                warn!(
                    "'{}' matches {} chunks by vertex count; falling back to interpolation",
                    mesh.name,
                    several.len()
                );
                return Ok(fallback(
                    config,
                    FallbackCloud::Merged,
                    FallbackReason::AmbiguousCountOrder(several.len()),
                ));
            }
        }
    }

    Ok(fallback(config, FallbackCloud::Merged, FallbackReason::NoMatch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::DestinationVertex;
    use glam::Vec3;
    use weights::{
        ChunkParts, GeometrySample, Influence, InfluenceWeights, NeighborSignature, Skeleton,
        SkinningMethod,
    };

    /// Four vertices on a strip
    fn adjacency() -> Vec<Vec<u32>> {
        vec![vec![1], vec![0, 2], vec![1, 3], vec![2]]
    }

    fn chunk(name: &str, vertex_count: u32, mixed: bool, signed: bool) -> Chunk {
        let samples = (0..vertex_count)
            .map(|i| {
                let weights = if mixed {
                    InfluenceWeights::from_pairs([("hip", 0.5), ("knee", 0.5)])
                } else {
                    InfluenceWeights::single("hip")
                };
                GeometrySample::new(i, Vec3::splat(i as f32), Vec3::Y, weights)
            })
            .collect();
        let neighbor_signature = if signed {
            let adjacency: Vec<Vec<u32>> = (0..vertex_count as usize)
                .map(|i| adjacency().get(i).cloned().unwrap_or_default())
                .collect();
            NeighborSignature::sample(&adjacency, 10)
        } else {
            NeighborSignature::default()
        };
        Chunk::from_parts(ChunkParts {
            mesh_name: name.to_string(),
            mesh_vertex_count: vertex_count,
            indices: (0..vertex_count).collect(),
            samples,
            skeleton: Skeleton::new(vec![Influence::new("hip"), Influence::new("knee")]).unwrap(),
            skinning_method: SkinningMethod::Linear,
            neighbor_signature,
            at_bind_pose: true,
            captured_at_ms: 0,
            author: String::new(),
            tool_version: String::new(),
        })
        .unwrap()
    }

    fn mesh(name: &str, vertex_count: u32) -> DestinationMesh {
        let vertices = (0..vertex_count)
            .map(|i| DestinationVertex::new(i, Vec3::splat(i as f32), Vec3::Y))
            .collect();
        DestinationMesh::new(name, vertex_count, vertices).with_adjacency(
            (0..vertex_count as usize)
                .map(|i| adjacency().get(i).cloned().unwrap_or_default())
                .collect(),
        )
    }

    #[test]
    fn test_no_chunks_is_an_error() {
        let store = ChunkStore::default();
        let result = resolve(&mesh("body", 4), &store, &ImportConfig::default());
        assert!(matches!(result, Err(ImportError::NoChunks)));
    }

    #[test]
    fn test_single_influence_takes_priority() {
        let store = ChunkStore::from_chunks([chunk("body", 3, false, false)]);
        // Different vertex count: topology would not match, single influence still wins
        let plan = resolve(&mesh("body", 4), &store, &ImportConfig::default()).unwrap();
        assert!(matches!(
            plan,
            ImportPlan::DirectSingleInfluence { ref influence, .. } if influence == "hip"
        ));
    }

    #[test]
    fn test_name_match_with_identical_topology() {
        let store = ChunkStore::from_chunks([chunk("body", 4, true, true)]);
        let plan = resolve(&mesh("|grp|body", 4), &store, &ImportConfig::default()).unwrap();
        assert!(matches!(plan, ImportPlan::DirectByIndex { matched_by: MatchKind::Name, .. }));
    }

    #[test]
    fn test_signature_mismatch_falls_back_on_named_chunk() {
        let store = ChunkStore::from_chunks([chunk("body", 4, true, true)]);
        let mut destination = mesh("body", 4);
        destination.adjacency = Some(vec![vec![2], vec![0, 2], vec![1, 3], vec![2]]);
        let plan = resolve(&destination, &store, &ImportConfig::default()).unwrap();
        assert_eq!(plan.kind(), PlanKind::FallbackChunk);
    }

    #[test]
    fn test_name_match_beats_count_order_match() {
        let store =
            ChunkStore::from_chunks([chunk("body", 3, true, true), chunk("other", 4, true, true)]);
        let plan = resolve(&mesh("body", 4), &store, &ImportConfig::default()).unwrap();
        match plan {
            ImportPlan::Fallback {
                cloud: FallbackCloud::Chunk(chunk),
                use_merged_cloud,
                reason,
                ..
            } => {
                assert_eq!(chunk.mesh_name(), "body");
                assert!(!use_merged_cloud);
                assert_eq!(reason, FallbackReason::TopologyMismatch);
            }
            other => panic!("unexpected plan {:?}", other),
        }
    }

    #[test]
    fn test_unique_count_order_match() {
        let store =
            ChunkStore::from_chunks([chunk("other", 4, true, true), chunk("small", 2, true, true)]);
        let plan = resolve(&mesh("body", 4), &store, &ImportConfig::default()).unwrap();
        assert!(matches!(
            plan,
            ImportPlan::DirectByIndex { matched_by: MatchKind::VertexCountOrder, .. }
        ));

        let config = ImportConfig {
            load_by_vert_count_order: false,
            ..ImportConfig::default()
        };
        let plan = resolve(&mesh("body", 4), &store, &config).unwrap();
        assert_eq!(plan.kind(), PlanKind::FallbackMerged);
    }

    #[test]
    fn test_count_order_requires_signature() {
        let store = ChunkStore::from_chunks([chunk("other", 4, true, false)]);
        let plan = resolve(&mesh("body", 4), &store, &ImportConfig::default()).unwrap();
        assert!(matches!(plan, ImportPlan::Fallback { reason: FallbackReason::NoMatch, .. }));
    }

    #[test]
    fn test_ambiguous_count_order_falls_back() {
        let store = ChunkStore::from_chunks([chunk("a", 4, true, true), chunk("b", 4, true, true)]);
        let plan = resolve(&mesh("body", 4), &store, &ImportConfig::default()).unwrap();
        assert!(matches!(
            plan,
            ImportPlan::Fallback {
                cloud: FallbackCloud::Merged,
                use_merged_cloud: true,
                reason: FallbackReason::AmbiguousCountOrder(2),
                ..
            }
        ));
    }

    #[test]
    fn test_forced_merged_cloud_skips_name_match() {
        let store = ChunkStore::from_chunks([chunk("body", 4, false, true)]);
        let config = ImportConfig {
            use_uber_chunk: true,
            use_normal_filter: true,
            ..ImportConfig::default()
        };
        let plan = resolve(&mesh("body", 4), &store, &config).unwrap();
        assert!(matches!(
            plan,
            ImportPlan::Fallback {
                reason: FallbackReason::ForcedMergedCloud,
                use_normal_filter: true,
                ..
            }
        ));
    }
}

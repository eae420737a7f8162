//! Fallback skinning: interpolating weights from a point cloud.
//!
//! Used whenever a destination mesh cannot be copied 1:1. Both algorithms
//! are stateless per vertex once the index is built, so a whole mesh is
//! resolved with a parallel iterator over its vertices.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use skinner_config::{FallbackAlgorithm, ImportConfig};
use weights::{GeometrySample, InfluenceWeights, PoseData, PoseSpace, SampleCloud};

use crate::destination::DestinationVertex;
use crate::spatial::{Neighbor, PointIndex};

/// Share of the priority removed from the farthest blended candidate.
///
/// Priority falls linearly from 1.0 at the closest candidate to
/// `1.0 - PRIORITY_FALLOFF` at the farthest.
pub const PRIORITY_FALLOFF: f32 = 0.75;

/// Initial candidate count scanned by the normal-filtered closest point.
const NORMAL_SCAN_START: usize = 8;

/// How a destination vertex received its weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VertexStrategy {
    /// Full weight on the single influence of the matched chunk
    SingleInfluence,
    /// Copied from the sample with the same vertex index
    ByIndex,
    /// Copied from the nearest (normal-compatible) sample
    ClosestPoint,
    /// Blended from the nearest samples inside the search bubble
    ClosestNeighbors,
    /// Normal filter rejected every candidate; nearest sample used instead
    NormalFilterFallback,
}

impl VertexStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SingleInfluence => "single influence",
            Self::ByIndex => "by index",
            Self::ClosestPoint => "closest point",
            Self::ClosestNeighbors => "closest neighbors",
            Self::NormalFilterFallback => "normal filter fallback",
        }
    }
}

/// Final weights for one destination vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexResult {
    pub index: u32,
    pub weights: InfluenceWeights,
    pub blend_weight: Option<f32>,
    pub strategy: VertexStrategy,
    /// Adjusted by the smoothing pass
    pub smoothed: bool,
}

impl VertexResult {
    pub fn new(index: u32, weights: InfluenceWeights, strategy: VertexStrategy) -> Self {
        Self {
            index,
            weights,
            blend_weight: None,
            strategy,
            smoothed: false,
        }
    }

    fn copied(
        index: u32,
        sample: &GeometrySample,
        carry_blend: bool,
        strategy: VertexStrategy,
    ) -> Self {
        Self {
            index,
            weights: sample.weights.clone(),
            blend_weight: sample.blend_weight.filter(|_| carry_blend),
            strategy,
            smoothed: false,
        }
    }
}

/// Interpolates weights from one cloud through a prebuilt index.
pub struct FallbackEngine<'a> {
    cloud: &'a dyn SampleCloud,
    index: &'a dyn PointIndex,
    space: PoseSpace,
    config: &'a ImportConfig,
    carry_blend: bool,
}

impl<'a> FallbackEngine<'a> {
    /// `index` must have been built over `cloud.positions(space)`.
    pub fn new(
        cloud: &'a dyn SampleCloud,
        index: &'a dyn PointIndex,
        space: PoseSpace,
        config: &'a ImportConfig,
    ) -> Self {
        Self {
            cloud,
            index,
            space,
            config,
            carry_blend: false,
        }
    }

    /// Carry blend weights (weight-blended skinning only).
    pub fn with_blend_weights(mut self, carry_blend: bool) -> Self {
        self.carry_blend = carry_blend;
        self
    }

    pub fn space(&self) -> PoseSpace {
        self.space
    }

    /// Resolve every vertex in parallel, preserving input order.
    pub fn resolve_all(&self, vertices: &[DestinationVertex]) -> Vec<VertexResult> {
        vertices
            .par_iter()
            .map(|vertex| self.resolve(vertex.index, vertex.pose(self.space)))
            .collect()
    }

    /// Resolve one vertex with the configured algorithm.
    pub fn resolve(&self, index: u32, query: PoseData) -> VertexResult {
        match self.config.fallback_algorithm {
            FallbackAlgorithm::ClosestPoint => self.closest_point(index, query),
            FallbackAlgorithm::ClosestNeighbors => self.closest_neighbors(index, query),
        }
    }

    fn sample(&self, neighbor: &Neighbor) -> &GeometrySample {
        self.cloud.sample(neighbor.index)
    }

    fn passes_normal_filter(&self, neighbor: &Neighbor, normal: glam::Vec3) -> bool {
        let sample_normal = self.sample(neighbor).normal(self.space).normalize_or_zero();
        sample_normal.dot(normal) >= self.config.normal_tolerance
    }

    /// Nearest sample ignoring normals; the floor every vertex can fall back to.
    fn nearest_unfiltered(
        &self,
        index: u32,
        query: PoseData,
        strategy: VertexStrategy,
    ) -> VertexResult {
        match self.index.nearest_one(query.position) {
            Some(nearest) => {
                VertexResult::copied(index, self.sample(&nearest), self.carry_blend, strategy)
            }
            None => VertexResult::new(index, InfluenceWeights::new(), strategy),
        }
    }

    /// Copy the weights of the nearest sample.
    ///
    /// With the normal filter on, the nearest sample whose normal passes is
    /// used; if none in the cloud passes, the nearest sample regardless.
    pub fn closest_point(&self, index: u32, query: PoseData) -> VertexResult {
        if !self.config.use_normal_filter {
            return self.nearest_unfiltered(index, query, VertexStrategy::ClosestPoint);
        }

        let normal = query.normal.normalize_or_zero();
        let total = self.index.len();
        let mut k = NORMAL_SCAN_START.min(total);
        while k > 0 {
            let candidates = self.index.nearest(query.position, k, None);
            if let Some(hit) = candidates.iter().find(|n| self.passes_normal_filter(n, normal)) {
                return VertexResult::copied(
                    index,
                    self.sample(hit),
                    self.carry_blend,
                    VertexStrategy::ClosestPoint,
                );
            }
            if k == total {
                break;
            }
            k = (k * 4).min(total);
        }

        self.nearest_unfiltered(index, query, VertexStrategy::NormalFilterFallback)
    }

    /// Distance-weighted blend of the nearest samples inside the search bubble.
    pub fn closest_neighbors(&self, index: u32, query: PoseData) -> VertexResult {
        let Some(nearest) = self.index.nearest_one(query.position) else {
            return VertexResult::new(
                index,
                InfluenceWeights::new(),
                VertexStrategy::ClosestNeighbors,
            );
        };

        let radius = nearest.distance * self.config.neighbor_distance_multiplier;
        let mut candidates = self.index.nearest(
            query.position,
            self.config.num_closest_neighbors,
            Some(radius),
        );
        if candidates.is_empty() {
            candidates.push(nearest);
        }

        if self.config.use_normal_filter {
            let normal = query.normal.normalize_or_zero();
            candidates.retain(|n| self.passes_normal_filter(n, normal));
            if candidates.is_empty() {
                return self.nearest_unfiltered(index, query, VertexStrategy::NormalFilterFallback);
            }
        }

        let priorities = priorities(&candidates);

        let mut weights = InfluenceWeights::new();
        for (neighbor, &priority) in candidates.iter().zip(&priorities) {
            weights.add_scaled(&self.sample(neighbor).weights, priority);
        }

        let blend_weight = if self.carry_blend {
            let (sum, total) = candidates
                .iter()
                .zip(&priorities)
                .filter_map(|(neighbor, &priority)| {
                    self.sample(neighbor).blend_weight.map(|value| (value * priority, priority))
                })
                .fold((0.0, 0.0), |(sum, total), (value, priority)| {
                    (sum + value, total + priority)
                });
            (total > 0.0).then(|| (sum / total).clamp(0.0, 1.0))
        } else {
            None
        };

        VertexResult {
            index,
            weights: weights.normalized(),
            blend_weight,
            strategy: VertexStrategy::ClosestNeighbors,
            smoothed: false,
        }
    }
}

/// Linear falloff over distances normalized to [0, 1] among `candidates`.
///
/// `candidates` must be sorted by ascending distance.
fn priorities(candidates: &[Neighbor]) -> Vec<f32> {
    let (Some(first), Some(last)) = (candidates.first(), candidates.last()) else {
        return Vec::new();
    };
    let (near, far) = (first.distance, last.distance);
    let span = far - near;
    candidates
        .iter()
        .map(|neighbor| {
            let t = if span > 0.0 {
                ((neighbor.distance - near) / span).clamp(0.0, 1.0)
            } else {
                0.0
            };
            1.0 - PRIORITY_FALLOFF * t
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{BruteForceIndex, PointOctree};
    use glam::Vec3;
    use weights::{
        Chunk, ChunkParts, ChunkStore, Influence, NeighborSignature, Skeleton, SkinningMethod,
    };

    /// Three samples on the x axis, each fully weighted to its own influence.
    fn line_chunk() -> Chunk {
        let names = ["A", "B", "C"];
        let samples = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                GeometrySample::new(
                    i as u32,
                    Vec3::new(i as f32, 0.0, 0.0),
                    Vec3::Y,
                    InfluenceWeights::single(*name),
                )
                .with_blend_weight(i as f32 * 0.5)
            })
            .collect();
        Chunk::from_parts(ChunkParts {
            mesh_name: "line".to_string(),
            mesh_vertex_count: 3,
            indices: vec![0, 1, 2],
            samples,
            skeleton: Skeleton::new(names.iter().map(|n| Influence::new(*n)).collect()).unwrap(),
            skinning_method: SkinningMethod::WeightBlended,
            neighbor_signature: NeighborSignature::default(),
            at_bind_pose: true,
            captured_at_ms: 0,
            author: String::new(),
            tool_version: String::new(),
        })
        .unwrap()
    }

    fn config(algorithm: FallbackAlgorithm) -> ImportConfig {
        ImportConfig {
            fallback_algorithm: algorithm,
            num_closest_neighbors: 3,
            neighbor_distance_multiplier: 2.0,
            ..ImportConfig::default()
        }
    }

    fn query(x: f32, y: f32) -> PoseData {
        PoseData::new(Vec3::new(x, y, 0.0), Vec3::Y)
    }

    #[test]
    fn test_closest_point_scenario() {
        let chunk = line_chunk();
        let index = PointOctree::build(&chunk.positions(PoseSpace::Current));
        let config = config(FallbackAlgorithm::ClosestPoint);
        let engine = FallbackEngine::new(&chunk, &index, PoseSpace::Current, &config);

        let result = engine.resolve(0, query(0.9, 0.0));
        assert_eq!(result.strategy, VertexStrategy::ClosestPoint);
        assert_eq!(result.weights.get("B"), 1.0);
        assert_eq!(result.weights.nonzero_count(), 1);
        assert_eq!(result.blend_weight, None);
    }

    #[test]
    fn test_closest_neighbors_radius_keeps_only_bubble() {
        // d0 = 0.1, so the bubble of radius 0.2 holds only B
        let chunk = line_chunk();
        let index = BruteForceIndex::new(&chunk.positions(PoseSpace::Current));
        let config = config(FallbackAlgorithm::ClosestNeighbors);
        let engine = FallbackEngine::new(&chunk, &index, PoseSpace::Current, &config);

        let result = engine.resolve(0, query(0.9, 0.0));
        assert_eq!(result.strategy, VertexStrategy::ClosestNeighbors);
        assert!((result.weights.get("B") - 1.0).abs() < 1e-6);
        assert!((result.weights.sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_closest_neighbors_blend_dominated_by_nearest() {
        // B is 2.0 away, A and C ~2.236 away, all inside the 4.0 bubble
        let chunk = line_chunk();
        let index = PointOctree::build(&chunk.positions(PoseSpace::Current));
        let config = config(FallbackAlgorithm::ClosestNeighbors);
        let engine = FallbackEngine::new(&chunk, &index, PoseSpace::Current, &config)
            .with_blend_weights(true);

        let result = engine.resolve(7, query(1.0, 2.0));
        let (a, b, c) = (result.weights.get("A"), result.weights.get("B"), result.weights.get("C"));
        assert!(b > a && b > c);
        assert!(a > 0.0 && c > 0.0);
        assert!((a - c).abs() < 1e-6);
        assert!((result.weights.sum() - 1.0).abs() < 1e-6);
        let blend = result.blend_weight.unwrap();
        assert!(blend > 0.0 && blend < 1.0);
    }

    #[test]
    fn test_closest_neighbors_always_normalized() {
        let chunk = line_chunk();
        let index = BruteForceIndex::new(&chunk.positions(PoseSpace::Current));
        for neighbors in 1..=3 {
            for multiplier in [0.5, 1.0, 2.0, 10.0] {
                let config = ImportConfig {
                    num_closest_neighbors: neighbors,
                    neighbor_distance_multiplier: multiplier,
                    ..ImportConfig::default()
                };
                let engine = FallbackEngine::new(&chunk, &index, PoseSpace::Current, &config);
                for x in [-1.0, 0.3, 0.5, 1.7, 4.0] {
                    let result = engine.closest_neighbors(0, query(x, 0.4));
                    assert!((result.weights.sum() - 1.0).abs() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_impossible_normal_filter_falls_back() {
        let chunk = line_chunk();
        let index = PointOctree::build(&chunk.positions(PoseSpace::Current));
        for algorithm in [FallbackAlgorithm::ClosestPoint, FallbackAlgorithm::ClosestNeighbors] {
            let config = ImportConfig {
                use_normal_filter: true,
                normal_tolerance: 1.0,
                ..config(algorithm)
            };
            let engine = FallbackEngine::new(&chunk, &index, PoseSpace::Current, &config);
            let tilted = PoseData::new(Vec3::new(0.9, 0.0, 0.0), Vec3::new(0.3, 1.0, 0.0));
            let result = engine.resolve(0, tilted);
            assert_eq!(result.strategy, VertexStrategy::NormalFilterFallback);
            assert_eq!(result.weights.get("B"), 1.0);
        }
    }

    #[test]
    fn test_normal_filter_skips_back_facing_sample() {
        let mut samples: Vec<GeometrySample> = line_chunk().samples().to_vec();
        samples[1].current.normal = Vec3::NEG_Y;
        let base = line_chunk();
        let chunk = Chunk::from_parts(ChunkParts {
            mesh_name: "line".to_string(),
            mesh_vertex_count: 3,
            indices: vec![0, 1, 2],
            samples,
            skeleton: base.skeleton().clone(),
            skinning_method: SkinningMethod::Linear,
            neighbor_signature: NeighborSignature::default(),
            at_bind_pose: true,
            captured_at_ms: 0,
            author: String::new(),
            tool_version: String::new(),
        })
        .unwrap();
        let index = PointOctree::build(&chunk.positions(PoseSpace::Current));
        let config = ImportConfig {
            use_normal_filter: true,
            normal_tolerance: 0.5,
            ..config(FallbackAlgorithm::ClosestPoint)
        };
        let engine = FallbackEngine::new(&chunk, &index, PoseSpace::Current, &config);
        let result = engine.resolve(0, query(0.9, 0.0));
        assert_eq!(result.strategy, VertexStrategy::ClosestPoint);
        assert_eq!(result.weights.get("A"), 1.0);
    }

    #[test]
    fn test_resolve_all_over_merged_cloud() {
        let store = ChunkStore::from_chunks([line_chunk()]);
        let merged = store.merged_cloud();
        let index = PointOctree::build(&merged.positions(PoseSpace::Current));
        let config = config(FallbackAlgorithm::ClosestPoint);
        let engine = FallbackEngine::new(&merged, &index, PoseSpace::Current, &config);

        let vertices: Vec<DestinationVertex> = (0..50)
            .map(|i| DestinationVertex::new(i, Vec3::new(i as f32 * 0.04, 0.1, 0.0), Vec3::Y))
            .collect();
        let results = engine.resolve_all(&vertices);
        assert_eq!(results.len(), 50);
        assert!(results.iter().enumerate().all(|(i, r)| r.index == i as u32));
        assert_eq!(results[0].weights.get("A"), 1.0);
        assert_eq!(results[49].weights.get("C"), 1.0);
    }

    #[test]
    fn test_priorities_linear_falloff() {
        let candidates = [
            Neighbor { index: 0, distance: 1.0 },
            Neighbor { index: 1, distance: 2.0 },
            Neighbor { index: 2, distance: 3.0 },
        ];
        let p = priorities(&candidates);
        assert_eq!(p[0], 1.0);
        assert!((p[1] - 0.625).abs() < 1e-6);
        assert!((p[2] - 0.25).abs() < 1e-6);
        assert_eq!(priorities(&candidates[..1]), vec![1.0]);
    }
}

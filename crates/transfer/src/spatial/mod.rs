//! Nearest-neighbor indexes over sample clouds.
//!
//! An index is built once per cloud and pose space, then shared read-only
//! across worker threads. Every query returns neighbors ordered by
//! ascending distance, with equal distances ordered by cloud index so the
//! result never depends on how the index was built.

use glam::Vec3;
use skinner_config::SpatialBackend;
use std::cmp::Ordering;

pub mod octree;

pub use octree::{OctreeConfig, PointOctree};

/// A cloud sample found by a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Index into the cloud the index was built over
    pub index: usize,
    pub distance: f32,
}

impl Neighbor {
    /// Total order: distance first, then cloud index.
    pub fn order(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.index.cmp(&other.index))
    }
}

/// Insert `candidate` into `best` (kept sorted) and cap it at `k` entries.
pub(crate) fn push_bounded(best: &mut Vec<Neighbor>, candidate: Neighbor, k: usize) {
    if best.len() == k {
        match best.last() {
            Some(worst) if candidate.order(worst) == Ordering::Less => {}
            _ => return,
        }
    }
    let slot = best
        .binary_search_by(|probe| probe.order(&candidate))
        .unwrap_or_else(|slot| slot);
    best.insert(slot, candidate);
    best.truncate(k);
}

/// Query contract shared by every spatial backend.
pub trait PointIndex: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `k` nearest points, optionally limited to `max_radius` (inclusive).
    fn nearest(&self, point: Vec3, k: usize, max_radius: Option<f32>) -> Vec<Neighbor>;

    /// Every point within `radius` (inclusive).
    fn within_radius(&self, point: Vec3, radius: f32) -> Vec<Neighbor>;

    fn nearest_one(&self, point: Vec3) -> Option<Neighbor> {
        self.nearest(point, 1, None).into_iter().next()
    }
}

/// Builds a [`PointIndex`] over cloud positions.
///
/// The importer builds through this trait, so alternative backends can be
/// plugged in without touching the fallback engine.
pub trait IndexBuilder: Send + Sync {
    fn build(&self, positions: &[Vec3]) -> Box<dyn PointIndex>;

    fn name(&self) -> &str;
}

/// Builder for the configured built-in backends.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackendBuilder(pub SpatialBackend);

impl IndexBuilder for BackendBuilder {
    fn build(&self, positions: &[Vec3]) -> Box<dyn PointIndex> {
        build_index(self.0, positions)
    }

    fn name(&self) -> &str {
        match self.0 {
            SpatialBackend::Octree => "octree",
            SpatialBackend::BruteForce => "brute force",
        }
    }
}

pub fn build_index(backend: SpatialBackend, positions: &[Vec3]) -> Box<dyn PointIndex> {
    match backend {
        SpatialBackend::Octree => Box::new(PointOctree::build(positions)),
        SpatialBackend::BruteForce => Box::new(BruteForceIndex::new(positions)),
    }
}

/// Linear scan over every point.
#[derive(Debug, Clone)]
pub struct BruteForceIndex {
    positions: Vec<Vec3>,
}

impl BruteForceIndex {
    pub fn new(positions: &[Vec3]) -> Self {
        Self {
            positions: positions.to_vec(),
        }
    }
}

impl PointIndex for BruteForceIndex {
    fn len(&self) -> usize {
        self.positions.len()
    }

    fn nearest(&self, point: Vec3, k: usize, max_radius: Option<f32>) -> Vec<Neighbor> {
        let mut best = Vec::with_capacity(k.min(self.positions.len()));
        if k == 0 {
            return best;
        }
        for (index, position) in self.positions.iter().enumerate() {
            let distance = position.distance(point);
            if max_radius.is_some_and(|radius| distance > radius) {
                continue;
            }
            push_bounded(&mut best, Neighbor { index, distance }, k);
        }
        best
    }

    fn within_radius(&self, point: Vec3, radius: f32) -> Vec<Neighbor> {
        let mut found: Vec<Neighbor> = self
            .positions
            .iter()
            .enumerate()
            .map(|(index, position)| Neighbor {
                index,
                distance: position.distance(point),
            })
            .filter(|neighbor| neighbor.distance <= radius)
            .collect();
        found.sort_by(Neighbor::order);
        found
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(f32::MIN),
        }
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        let mut bounds = Self::empty();
        for &point in points {
            bounds.include_point(point);
        }
        bounds
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn include_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Distance from `point` to the box; zero inside.
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        point.clamp(self.min, self.max).distance(point)
    }

    /// Get the octant index for a point (0-7).
    pub(crate) fn octant_for_point(&self, point: Vec3) -> usize {
        let center = self.center();
        let mut index = 0;
        if point.x >= center.x {
            index |= 1;
        }
        if point.y >= center.y {
            index |= 2;
        }
        if point.z >= center.z {
            index |= 4;
        }
        index
    }

    pub(crate) fn octant_bounds(&self, octant: usize) -> Aabb {
        let center = self.center();
        let min = Vec3::new(
            if octant & 1 != 0 { center.x } else { self.min.x },
            if octant & 2 != 0 { center.y } else { self.min.y },
            if octant & 4 != 0 { center.z } else { self.min.z },
        );
        let max = Vec3::new(
            if octant & 1 != 0 { self.max.x } else { center.x },
            if octant & 2 != 0 { self.max.y } else { center.y },
            if octant & 4 != 0 { self.max.z } else { center.z },
        );
        Aabb::new(min, max)
    }
}

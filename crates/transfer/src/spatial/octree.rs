//! Octree point index with best-first k-nearest search.

use glam::Vec3;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::{Aabb, Neighbor, PointIndex, push_bounded};

/// Configuration for octree construction.
#[derive(Debug, Clone)]
pub struct OctreeConfig {
    /// Maximum depth of the octree.
    pub max_depth: u32,
    /// Maximum items per leaf node before splitting.
    pub max_items_per_leaf: usize,
    /// Minimum node size (prevents infinite subdivision of coincident points).
    pub min_node_size: f32,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_items_per_leaf: 16,
            min_node_size: 1e-4,
        }
    }
}

/// An item stored in the octree: cloud index and position.
#[derive(Debug, Clone, Copy)]
struct OctreeItem {
    index: usize,
    position: Vec3,
}

#[derive(Debug)]
enum OctreeNode {
    Leaf {
        bounds: Aabb,
        items: Vec<OctreeItem>,
    },
    Internal {
        bounds: Aabb,
        children: Box<[Option<OctreeNode>; 8]>,
    },
}

impl OctreeNode {
    fn bounds(&self) -> &Aabb {
        match self {
            OctreeNode::Leaf { bounds, .. } | OctreeNode::Internal { bounds, .. } => bounds,
        }
    }
}

/// Pending node in a best-first search, ordered nearest-first.
struct Pending<'a> {
    distance: f32,
    node: &'a OctreeNode,
}

impl PartialEq for Pending<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.distance.total_cmp(&other.distance) == Ordering::Equal
    }
}

impl Eq for Pending<'_> {}

impl PartialOrd for Pending<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the closest node pops first
        other.distance.total_cmp(&self.distance)
    }
}

/// Static octree over a cloud's positions.
#[derive(Debug)]
pub struct PointOctree {
    root: OctreeNode,
    config: OctreeConfig,
    len: usize,
}

impl PointOctree {
    /// Build an octree over `positions`; item `i` is reported as cloud index `i`.
    pub fn build(positions: &[Vec3]) -> Self {
        Self::build_with_config(positions, OctreeConfig::default())
    }

    pub fn build_with_config(positions: &[Vec3], config: OctreeConfig) -> Self {
        let mut bounds = if positions.is_empty() {
            Aabb::new(Vec3::ZERO, Vec3::ZERO)
        } else {
            Aabb::from_points(positions)
        };

        // Expand bounds slightly to handle edge cases
        let padding = bounds.size() * 0.01 + Vec3::splat(0.001);
        bounds.min -= padding;
        bounds.max += padding;

        let mut octree = Self {
            root: OctreeNode::Leaf {
                bounds,
                items: Vec::new(),
            },
            config,
            len: 0,
        };
        for (index, &position) in positions.iter().enumerate() {
            Self::insert_into_node(
                &mut octree.root,
                OctreeItem { index, position },
                0,
                &octree.config,
            );
        }
        octree.len = positions.len();
        octree
    }

    fn insert_into_node(
        node: &mut OctreeNode,
        item: OctreeItem,
        depth: u32,
        config: &OctreeConfig,
    ) {
        match node {
            OctreeNode::Leaf { bounds, items } => {
                items.push(item);

                if items.len() > config.max_items_per_leaf
                    && depth < config.max_depth
                    && bounds.size().max_element() > config.min_node_size * 2.0
                {
                    let old_items = std::mem::take(items);
                    let old_bounds = *bounds;

                    *node = OctreeNode::Internal {
                        bounds: old_bounds,
                        children: Box::new([None, None, None, None, None, None, None, None]),
                    };

                    for item in old_items {
                        Self::insert_into_node(node, item, depth, config);
                    }
                }
            }
            OctreeNode::Internal { bounds, children } => {
                let octant = bounds.octant_for_point(item.position);

                let child = children[octant].get_or_insert_with(|| OctreeNode::Leaf {
                    bounds: bounds.octant_bounds(octant),
                    items: Vec::new(),
                });
                Self::insert_into_node(child, item, depth + 1, config);
            }
        }
    }

    fn within_radius_node(node: &OctreeNode, point: Vec3, radius: f32, found: &mut Vec<Neighbor>) {
        if node.bounds().distance_to_point(point) > radius {
            return;
        }
        match node {
            OctreeNode::Leaf { items, .. } => {
                for item in items {
                    let distance = item.position.distance(point);
                    if distance <= radius {
                        found.push(Neighbor {
                            index: item.index,
                            distance,
                        });
                    }
                }
            }
            OctreeNode::Internal { children, .. } => {
                for child in children.iter().flatten() {
                    Self::within_radius_node(child, point, radius, found);
                }
            }
        }
    }

    /// Depth of the deepest leaf.
    pub fn depth(&self) -> u32 {
        fn depth_of(node: &OctreeNode) -> u32 {
            match node {
                OctreeNode::Leaf { .. } => 0,
                OctreeNode::Internal { children, .. } => {
                    1 + children.iter().flatten().map(depth_of).max().unwrap_or(0)
                }
            }
        }
        depth_of(&self.root)
    }
}

impl PointIndex for PointOctree {
    fn len(&self) -> usize {
        self.len
    }

    fn nearest(&self, point: Vec3, k: usize, max_radius: Option<f32>) -> Vec<Neighbor> {
        let mut best: Vec<Neighbor> = Vec::with_capacity(k.min(self.len));
        if k == 0 || self.len == 0 {
            return best;
        }

        let mut heap = BinaryHeap::new();
        heap.push(Pending {
            distance: self.root.bounds().distance_to_point(point),
            node: &self.root,
        });

        while let Some(Pending { distance, node }) = heap.pop() {
            if max_radius.is_some_and(|radius| distance > radius) {
                break;
            }
            // Equal distances may still hold a lower cloud index, so only a
            // strictly farther node can be skipped
            if best.len() == k && best.last().is_some_and(|worst| distance > worst.distance) {
                break;
            }

            match node {
                OctreeNode::Leaf { items, .. } => {
                    for item in items {
                        let distance = item.position.distance(point);
                        if max_radius.is_some_and(|radius| distance > radius) {
                            continue;
                        }
                        push_bounded(
                            &mut best,
                            Neighbor {
                                index: item.index,
                                distance,
                            },
                            k,
                        );
                    }
                }
                OctreeNode::Internal { children, .. } => {
                    for child in children.iter().flatten() {
                        heap.push(Pending {
                            distance: child.bounds().distance_to_point(point),
                            node: child,
                        });
                    }
                }
            }
        }

        best
    }

    fn within_radius(&self, point: Vec3, radius: f32) -> Vec<Neighbor> {
        let mut found = Vec::new();
        Self::within_radius_node(&self.root, point, radius, &mut found);
        found.sort_by(Neighbor::order);
        found
    }
}

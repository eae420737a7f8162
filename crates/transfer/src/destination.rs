//! Destination meshes as supplied by the scene query.

use glam::Vec3;
use std::collections::HashSet;

use weights::{PoseData, PoseSpace, SkinningMethod, leaf_name};

use crate::error::ImportError;

/// A requested destination vertex with its query geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationVertex {
    pub index: u32,
    pub position: Vec3,
    pub normal: Vec3,
    pub pre_deformed: Option<PoseData>,
}

impl DestinationVertex {
    pub fn new(index: u32, position: Vec3, normal: Vec3) -> Self {
        Self {
            index,
            position,
            normal,
            pre_deformed: None,
        }
    }

    pub fn with_pre_deformed(mut self, position: Vec3, normal: Vec3) -> Self {
        self.pre_deformed = Some(PoseData::new(position, normal));
        self
    }

    /// Query pose for `space`; falls back to the current pose.
    pub fn pose(&self, space: PoseSpace) -> PoseData {
        match space {
            PoseSpace::Current => PoseData::new(self.position, self.normal),
            PoseSpace::PreDeformed => self
                .pre_deformed
                .unwrap_or(PoseData::new(self.position, self.normal)),
        }
    }
}

/// One destination mesh and the vertices requested for import.
#[derive(Debug, Clone)]
pub struct DestinationMesh {
    pub name: String,
    /// Total vertex count of the mesh (not just the requested subset)
    pub vertex_count: u32,
    pub vertices: Vec<DestinationVertex>,
    /// Full adjacency indexed by vertex; needed for smoothing and order checks
    pub adjacency: Option<Vec<Vec<u32>>>,
    /// Skinning method of an existing skin cluster, if any
    pub skinning_method: Option<SkinningMethod>,
}

impl DestinationMesh {
    pub fn new(
        name: impl Into<String>,
        vertex_count: u32,
        vertices: Vec<DestinationVertex>,
    ) -> Self {
        Self {
            name: name.into(),
            vertex_count,
            vertices,
            adjacency: None,
            skinning_method: None,
        }
    }

    pub fn with_adjacency(mut self, adjacency: Vec<Vec<u32>>) -> Self {
        self.adjacency = Some(adjacency);
        self
    }

    pub fn with_skinning_method(mut self, method: SkinningMethod) -> Self {
        self.skinning_method = Some(method);
        self
    }

    pub fn leaf_name(&self) -> &str {
        leaf_name(&self.name)
    }

    pub fn requested_count(&self) -> usize {
        self.vertices.len()
    }

    /// Whether every requested vertex carries pre-deformed data.
    pub fn has_pre_deformed(&self) -> bool {
        !self.vertices.is_empty() && self.vertices.iter().all(|v| v.pre_deformed.is_some())
    }

    pub fn validate(&self) -> Result<(), ImportError> {
        if self.vertices.is_empty() {
            return Err(ImportError::EmptyDestination(self.name.clone()));
        }

        let malformed = |reason: String| ImportError::MalformedDestination {
            mesh: self.name.clone(),
            reason,
        };

        let mut seen = HashSet::with_capacity(self.vertices.len());
        for vertex in &self.vertices {
            if vertex.index >= self.vertex_count {
                return Err(malformed(format!(
                    "vertex {} is outside a mesh of {} vertices",
                    vertex.index, self.vertex_count
                )));
            }
            if !seen.insert(vertex.index) {
                return Err(malformed(format!("vertex {} is requested twice", vertex.index)));
            }
        }

        if let Some(adjacency) = &self.adjacency {
            if adjacency.len() != self.vertex_count as usize {
                return Err(malformed(format!(
                    "adjacency covers {} vertices, mesh has {}",
                    adjacency.len(),
                    self.vertex_count
                )));
            }
            if let Some(bad) = adjacency.iter().flatten().find(|&&n| n >= self.vertex_count) {
                return Err(malformed(format!("adjacency references vertex {}", bad)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(index: u32) -> DestinationVertex {
        DestinationVertex::new(index, Vec3::splat(index as f32), Vec3::Y)
    }

    #[test]
    fn test_validate_rejects_empty() {
        let mesh = DestinationMesh::new("body", 4, vec![]);
        assert!(matches!(mesh.validate(), Err(ImportError::EmptyDestination(_))));
    }

    #[test]
    fn test_validate_rejects_bad_indices() {
        let mesh = DestinationMesh::new("body", 2, vec![vertex(0), vertex(2)]);
        assert!(matches!(mesh.validate(), Err(ImportError::MalformedDestination { .. })));

        let mesh = DestinationMesh::new("body", 2, vec![vertex(1), vertex(1)]);
        assert!(matches!(mesh.validate(), Err(ImportError::MalformedDestination { .. })));

        let mesh = DestinationMesh::new("body", 2, vec![vertex(0)]).with_adjacency(vec![vec![1]]);
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn test_pose_selection() {
        let v = vertex(1).with_pre_deformed(Vec3::ZERO, Vec3::Z);
        assert_eq!(v.pose(PoseSpace::Current).position, Vec3::ONE);
        assert_eq!(v.pose(PoseSpace::PreDeformed).normal, Vec3::Z);

        let mesh = DestinationMesh::new("|grp|ns:body", 2, vec![v, vertex(0)]);
        assert_eq!(mesh.leaf_name(), "body");
        assert!(!mesh.has_pre_deformed());
        assert!(mesh.validate().is_ok());
    }
}

//! Influence skeleton recorded alongside captured weights.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::ChunkError;

/// Euler rotation order of a joint, in host enum order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum RotateOrder {
    #[default]
    Xyz = 0,
    Yzx = 1,
    Zxy = 2,
    Xzy = 3,
    Yxz = 4,
    Zyx = 5,
}

/// Local transform channels of a joint at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalTransform {
    pub translate: Vec3,
    pub rotate: Vec3,
    pub scale: Vec3,
    pub rotate_axis: Vec3,
    pub joint_orient: Vec3,
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self {
            translate: Vec3::ZERO,
            rotate: Vec3::ZERO,
            scale: Vec3::ONE,
            rotate_axis: Vec3::ZERO,
            joint_orient: Vec3::ZERO,
        }
    }
}

/// A joint contributing weights to the captured mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Influence {
    /// Leaf name (no path, no namespace)
    pub name: String,
    /// World matrix at the bind pose (or at capture when no bind pose was recorded)
    pub world_matrix: Mat4,
    pub local: LocalTransform,
    pub rotate_order: RotateOrder,
    /// Leaf name of the parent joint, `None` when parented to the world
    pub parent: Option<String>,
}

impl Influence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            world_matrix: Mat4::IDENTITY,
            local: LocalTransform::default(),
            rotate_order: RotateOrder::default(),
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_world_matrix(mut self, world_matrix: Mat4) -> Self {
        self.world_matrix = world_matrix;
        self
    }
}

/// Ordered list of influences with unique leaf names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Skeleton {
    influences: Vec<Influence>,
}

impl Skeleton {
    pub fn new(influences: Vec<Influence>) -> Result<Self, ChunkError> {
        let skeleton = Self { influences };
        skeleton.validate()?;
        Ok(skeleton)
    }

    pub fn validate(&self) -> Result<(), ChunkError> {
        for (i, influence) in self.influences.iter().enumerate() {
            if self.influences[..i].iter().any(|other| other.name == influence.name) {
                return Err(ChunkError::DuplicateInfluence(influence.name.clone()));
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Influence> {
        self.influences.iter().find(|influence| influence.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.influences.iter().map(|influence| influence.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Influence> {
        self.influences.iter()
    }

    pub fn len(&self) -> usize {
        self.influences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.influences.is_empty()
    }

    /// Append influences from `other` that are not already present.
    ///
    /// The first recorded definition of a name wins.
    pub fn extend_union(&mut self, other: &Skeleton) {
        for influence in &other.influences {
            if !self.contains(&influence.name) {
                self.influences.push(influence.clone());
            }
        }
    }

    /// Influences not found in `existing`, in skeleton order.
    pub fn missing_from<'a>(&'a self, existing: &[&str]) -> Vec<&'a Influence> {
        self.influences
            .iter()
            .filter(|influence| !existing.contains(&influence.name.as_str()))
            .collect()
    }
}

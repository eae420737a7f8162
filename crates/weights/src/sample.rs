//! Per-vertex geometry samples.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::influence::InfluenceWeights;

/// Position and normal of a vertex in one pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseData {
    pub position: Vec3,
    pub normal: Vec3,
}

impl PoseData {
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self { position, normal }
    }
}

/// Which pose a query or sample position refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PoseSpace {
    /// World-space pose at capture (or query) time
    #[default]
    Current,
    /// Pre-deformed (rest) pose, when the mesh was not at its bind pose
    PreDeformed,
}

/// Immutable record of one captured vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometrySample {
    /// Vertex index in the source mesh
    pub source_index: u32,
    /// Current-pose position and normal
    pub current: PoseData,
    /// Pre-deformed position and normal (only captured away from the bind pose)
    pub pre_deformed: Option<PoseData>,
    pub weights: InfluenceWeights,
    /// Dual-quaternion blend weight (weight-blended skinning only)
    pub blend_weight: Option<f32>,
}

impl GeometrySample {
    pub fn new(source_index: u32, position: Vec3, normal: Vec3, weights: InfluenceWeights) -> Self {
        Self {
            source_index,
            current: PoseData::new(position, normal),
            pre_deformed: None,
            weights,
            blend_weight: None,
        }
    }

    pub fn with_pre_deformed(mut self, position: Vec3, normal: Vec3) -> Self {
        self.pre_deformed = Some(PoseData::new(position, normal));
        self
    }

    pub fn with_blend_weight(mut self, blend_weight: f32) -> Self {
        self.blend_weight = Some(blend_weight);
        self
    }

    /// Pose data for `space`, falling back to the current pose when no
    /// pre-deformed data was captured.
    pub fn pose(&self, space: PoseSpace) -> PoseData {
        match space {
            PoseSpace::Current => self.current,
            PoseSpace::PreDeformed => self.pre_deformed.unwrap_or(self.current),
        }
    }

    pub fn position(&self, space: PoseSpace) -> Vec3 {
        self.pose(space).position
    }

    pub fn normal(&self, space: PoseSpace) -> Vec3 {
        self.pose(space).normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pre_deformed_falls_back_to_current() {
        let sample = GeometrySample::new(0, Vec3::X, Vec3::Y, InfluenceWeights::single("root"));
        assert_eq!(sample.position(PoseSpace::PreDeformed), Vec3::X);

        let sample = sample.with_pre_deformed(Vec3::Z, Vec3::Z);
        assert_eq!(sample.position(PoseSpace::PreDeformed), Vec3::Z);
        assert_eq!(sample.position(PoseSpace::Current), Vec3::X);
    }
}

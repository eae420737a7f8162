//! Shared configuration for Skinner
//!
//! This crate provides the single source of truth for the options that
//! drive weight import (fallback algorithm, neighbor search, normal
//! filtering, smoothing) and weight export (capture sampling).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default search bubble multiplier for closest-neighbor gathering
pub const DEFAULT_NEIGHBOR_DISTANCE_MULTIPLIER: f32 = 2.0;

/// Default number of neighbors blended by closest-neighbor interpolation
pub const DEFAULT_NUM_CLOSEST_NEIGHBORS: usize = 6;

/// Upper bound on neighbors gathered per destination vertex
pub const MAX_CLOSEST_NEIGHBORS: usize = 64;

/// Default number of post-import smoothing iterations
pub const DEFAULT_SMOOTHING_STEPS: u32 = 2;

/// Default per-influence difference that marks a weight discontinuity
pub const DEFAULT_WEIGHT_DIFFERENCE_THRESHOLD: f32 = 0.25;

/// Default blend factor toward the neighbor average per smoothing step
pub const DEFAULT_SMOOTHING_STRENGTH: f32 = 0.5;

/// Distance under which a destination vertex counts as sitting on a sample
pub const DEFAULT_EXACT_MATCH_TOLERANCE: f32 = 1e-4;

/// Default number of adjacency samples recorded at capture time
pub const DEFAULT_NEIGHBOR_SAMPLES: usize = 10;

/// Tolerance used when checking that captured weights sum to one
pub const WEIGHT_SUM_TOLERANCE: f32 = 1e-3;

/// Invalid configuration values
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("neighbor_distance_multiplier must be positive, got {0}")]
    InvalidDistanceMultiplier(f32),
    #[error("num_closest_neighbors must be in 1..={max}, got {value}")]
    InvalidNeighborCount { value: usize, max: usize },
    #[error("normal_tolerance must be in [-1, 1], got {0}")]
    InvalidNormalTolerance(f32),
    #[error("weight_difference_threshold must be non-negative, got {0}")]
    InvalidWeightThreshold(f32),
    #[error("smoothing_strength must be in (0, 1], got {0}")]
    InvalidSmoothingStrength(f32),
    #[error("exact_match_tolerance must be non-negative, got {0}")]
    InvalidMatchTolerance(f32),
    #[error("neighbor_samples must be at least 1")]
    InvalidNeighborSamples,
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Interpolation used when weights cannot be copied 1:1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FallbackAlgorithm {
    /// Copy the weights of the nearest cloud sample
    ClosestPoint,
    /// Distance-weighted blend of the nearest samples inside a search bubble
    #[default]
    ClosestNeighbors,
}

/// Nearest-neighbor backend built over each point cloud
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpatialBackend {
    /// Octree with best-first k-NN search
    #[default]
    Octree,
    /// Linear scan over every sample (baseline)
    BruteForce,
}

/// Options consumed by a weight import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub fallback_algorithm: FallbackAlgorithm,
    /// Search radius is the nearest distance times this value
    pub neighbor_distance_multiplier: f32,
    /// Maximum samples blended per vertex, including the closest
    pub num_closest_neighbors: usize,
    /// Reject samples whose normal faces away from the destination normal
    pub use_normal_filter: bool,
    /// Minimum normal dot product accepted by the filter
    pub normal_tolerance: f32,
    /// Allow 1:1 copy from an unnamed chunk with identical count and order
    pub load_by_vert_count_order: bool,
    /// Skip name matching and always interpolate from the merged cloud
    pub use_uber_chunk: bool,
    pub smoothing_steps: u32,
    pub weight_difference_threshold: f32,
    /// Query with pre-deformed positions/normals when both sides have them
    pub use_pre_deformed: bool,
    pub spatial_backend: SpatialBackend,
    pub smoothing_strength: f32,
    pub exact_match_tolerance: f32,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            fallback_algorithm: FallbackAlgorithm::default(),
            neighbor_distance_multiplier: DEFAULT_NEIGHBOR_DISTANCE_MULTIPLIER,
            num_closest_neighbors: DEFAULT_NUM_CLOSEST_NEIGHBORS,
            use_normal_filter: false,
            normal_tolerance: 0.0,
            load_by_vert_count_order: true,
            use_uber_chunk: false,
            smoothing_steps: DEFAULT_SMOOTHING_STEPS,
            weight_difference_threshold: DEFAULT_WEIGHT_DIFFERENCE_THRESHOLD,
            use_pre_deformed: true,
            spatial_backend: SpatialBackend::default(),
            smoothing_strength: DEFAULT_SMOOTHING_STRENGTH,
            exact_match_tolerance: DEFAULT_EXACT_MATCH_TOLERANCE,
        }
    }
}

impl ImportConfig {
    /// Parse a config from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every option is inside its documented range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.neighbor_distance_multiplier > 0.0) {
            return Err(ConfigError::InvalidDistanceMultiplier(
                self.neighbor_distance_multiplier,
            ));
        }
        if self.num_closest_neighbors == 0 || self.num_closest_neighbors > MAX_CLOSEST_NEIGHBORS {
            return Err(ConfigError::InvalidNeighborCount {
                value: self.num_closest_neighbors,
                max: MAX_CLOSEST_NEIGHBORS,
            });
        }
        if !(-1.0..=1.0).contains(&self.normal_tolerance) {
            return Err(ConfigError::InvalidNormalTolerance(self.normal_tolerance));
        }
        if !(self.weight_difference_threshold >= 0.0) {
            return Err(ConfigError::InvalidWeightThreshold(
                self.weight_difference_threshold,
            ));
        }
        if !(self.smoothing_strength > 0.0 && self.smoothing_strength <= 1.0) {
            return Err(ConfigError::InvalidSmoothingStrength(self.smoothing_strength));
        }
        if !(self.exact_match_tolerance >= 0.0) {
            return Err(ConfigError::InvalidMatchTolerance(self.exact_match_tolerance));
        }
        Ok(())
    }

    /// Whether the merged cloud replaces name matching entirely
    pub fn forces_merged_cloud(&self) -> bool {
        self.use_uber_chunk
    }

    /// Count/order matching is disabled whenever the merged cloud is forced
    pub fn count_order_enabled(&self) -> bool {
        self.load_by_vert_count_order && !self.use_uber_chunk
    }
}

/// Options consumed when capturing chunks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Number of adjacency samples stored for vertex-order verification
    pub neighbor_samples: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            neighbor_samples: DEFAULT_NEIGHBOR_SAMPLES,
        }
    }
}

impl ExportConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.neighbor_samples == 0 {
            return Err(ConfigError::InvalidNeighborSamples);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ImportConfig::default();
        assert_eq!(config.fallback_algorithm, FallbackAlgorithm::ClosestNeighbors);
        assert_eq!(config.neighbor_distance_multiplier, 2.0);
        assert_eq!(config.smoothing_steps, 2);
        assert_eq!(config.weight_difference_threshold, 0.25);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            ImportConfig::from_json_str(r#"{ "use_normal_filter": true, "normal_tolerance": 0.5 }"#)
                .unwrap();
        assert!(config.use_normal_filter);
        assert_eq!(config.normal_tolerance, 0.5);
        assert_eq!(config.num_closest_neighbors, DEFAULT_NUM_CLOSEST_NEIGHBORS);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut config = ImportConfig::default();
        config.normal_tolerance = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidNormalTolerance(_))
        ));

        let mut config = ImportConfig::default();
        config.num_closest_neighbors = MAX_CLOSEST_NEIGHBORS + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidNeighborCount { .. })
        ));

        let mut config = ImportConfig::default();
        config.neighbor_distance_multiplier = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_forcing_merged_cloud_disables_count_order() {
        let mut config = ImportConfig::default();
        assert!(config.count_order_enabled());
        config.use_uber_chunk = true;
        assert!(!config.count_order_enabled());
    }

    #[test]
    fn test_export_config_requires_samples() {
        let config = ExportConfig { neighbor_samples: 0 };
        assert!(config.validate().is_err());
    }
}

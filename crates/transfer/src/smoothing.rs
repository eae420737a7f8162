//! Post-import relaxation of weight discontinuities.

use rayon::prelude::*;
use std::collections::HashMap;

use skinner_config::ImportConfig;
use weights::InfluenceWeights;

use crate::fallback::VertexResult;

/// Smoothing only runs when the destination is sampled more finely than
/// the cloud it was interpolated from.
pub fn should_smooth(config: &ImportConfig, requested: usize, cloud_len: usize) -> bool {
    config.smoothing_steps > 0 && requested > cloud_len
}

/// Relax vertices whose weights jump against a neighbor.
///
/// `adjacency` is indexed by destination vertex index; neighbors that were
/// not requested are ignored. `locked[i]` marks results that sit on a cloud
/// sample and must stay untouched. Every step reads a snapshot of the
/// previous step, so updates never see each other mid-step.
///
/// Returns the number of vertices changed.
pub fn smooth(
    results: &mut [VertexResult],
    adjacency: &[Vec<u32>],
    locked: &[bool],
    config: &ImportConfig,
) -> usize {
    let slot_of: HashMap<u32, usize> = results
        .iter()
        .enumerate()
        .map(|(slot, result)| (result.index, slot))
        .collect();
    let neighbor_slots: Vec<Vec<usize>> = results
        .iter()
        .map(|result| {
            adjacency
                .get(result.index as usize)
                .map(|neighbors| {
                    neighbors
                        .iter()
                        .filter_map(|neighbor| slot_of.get(neighbor).copied())
                        .collect()
                })
                .unwrap_or_default()
        })
        .collect();

    let threshold = config.weight_difference_threshold;
    let strength = config.smoothing_strength;

    for _ in 0..config.smoothing_steps {
        let snapshot: Vec<InfluenceWeights> = results.iter().map(|r| r.weights.clone()).collect();

        let updates: Vec<Option<InfluenceWeights>> = (0..results.len())
            .into_par_iter()
            .map(|slot| {
                if locked.get(slot).copied().unwrap_or(false) {
                    return None;
                }
                let neighbors = &neighbor_slots[slot];
                if neighbors.is_empty() {
                    return None;
                }
                let own = &snapshot[slot];
                if !neighbors
                    .iter()
                    .any(|&n| own.max_difference(&snapshot[n]) > threshold)
                {
                    return None;
                }

                let mut average = InfluenceWeights::new();
                let share = 1.0 / neighbors.len() as f32;
                for &n in neighbors {
                    average.add_scaled(&snapshot[n], share);
                }

                // Blend toward the neighbor average
                let mut blended = InfluenceWeights::new();
                blended.add_scaled(own, 1.0 - strength);
                blended.add_scaled(&average, strength);
                Some(blended.normalized())
            })
            .collect();

        if updates.iter().all(Option::is_none) {
            break;
        }
        for (result, update) in results.iter_mut().zip(updates) {
            if let Some(weights) = update {
                result.weights = weights;
                result.smoothed = true;
            }
        }
    }

    results.iter().filter(|r| r.smoothed).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::VertexStrategy;

    fn result(index: u32, weights: InfluenceWeights) -> VertexResult {
        VertexResult::new(index, weights, VertexStrategy::ClosestPoint)
    }

    /// Five vertices on a strip: A A B B B
    fn strip() -> (Vec<VertexResult>, Vec<Vec<u32>>) {
        let results = vec![
            result(0, InfluenceWeights::single("A")),
            result(1, InfluenceWeights::single("A")),
            result(2, InfluenceWeights::single("B")),
            result(3, InfluenceWeights::single("B")),
            result(4, InfluenceWeights::single("B")),
        ];
        let adjacency = vec![vec![1], vec![0, 2], vec![1, 3], vec![2, 4], vec![3]];
        (results, adjacency)
    }

    #[test]
    fn test_should_smooth_scope() {
        let config = ImportConfig::default();
        assert!(should_smooth(&config, 10, 4));
        assert!(!should_smooth(&config, 4, 4));
        assert!(!should_smooth(&config, 3, 4));

        let config = ImportConfig {
            smoothing_steps: 0,
            ..ImportConfig::default()
        };
        assert!(!should_smooth(&config, 10, 4));
    }

    #[test]
    fn test_smooth_relaxes_boundary() {
        let (mut results, adjacency) = strip();
        let config = ImportConfig {
            smoothing_steps: 1,
            ..ImportConfig::default()
        };
        let changed = smooth(&mut results, &adjacency, &[false; 5], &config);

        // Only the two vertices at the A/B boundary differ from a neighbor
        assert_eq!(changed, 2);
        assert!(results[1].smoothed && results[2].smoothed);
        assert!(!results[0].smoothed && !results[4].smoothed);
        // Vertex 1 averages A and B neighbors: 0.5 * A + 0.5 * (0.5 A + 0.5 B)
        assert!((results[1].weights.get("A") - 0.75).abs() < 1e-6);
        assert!((results[2].weights.get("B") - 0.75).abs() < 1e-6);
        for r in &results {
            assert!((r.weights.sum() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_locked_vertices_are_untouched() {
        let (mut results, adjacency) = strip();
        let original = results.clone();
        let locked = [false, true, true, false, false];
        let changed = smooth(&mut results, &adjacency, &locked, &ImportConfig::default());
        assert_eq!(changed, 0);
        assert_eq!(results, original);
    }

    #[test]
    fn test_uniform_weights_converge_immediately() {
        let mut results = vec![
            result(0, InfluenceWeights::single("A")),
            result(1, InfluenceWeights::single("A")),
        ];
        let adjacency = vec![vec![1], vec![0]];
        let config = ImportConfig {
            smoothing_steps: 5,
            ..ImportConfig::default()
        };
        assert_eq!(smooth(&mut results, &adjacency, &[false, false], &config), 0);
    }
}

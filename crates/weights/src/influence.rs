//! Influence weight mappings.
//!
//! Weights are keyed by influence leaf name rather than by index so that
//! samples captured against different skeletons can be blended directly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from influence leaf name to scalar weight.
///
/// Iteration order is sorted by name, which keeps blending and
/// normalization deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InfluenceWeights(BTreeMap<String, f32>);

impl InfluenceWeights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full weight on a single influence.
    pub fn single(influence: impl Into<String>) -> Self {
        let mut weights = Self::new();
        weights.insert(influence, 1.0);
        weights
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f32)>,
        S: Into<String>,
    {
        let mut weights = Self::new();
        for (name, weight) in pairs {
            weights.insert(name, weight);
        }
        weights
    }

    pub fn insert(&mut self, influence: impl Into<String>, weight: f32) {
        self.0.insert(influence.into(), weight);
    }

    /// Weight on `influence`, zero when absent.
    pub fn get(&self, influence: &str) -> f32 {
        self.0.get(influence).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, influence: &str) -> bool {
        self.0.contains_key(influence)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.0.iter().map(|(name, weight)| (name.as_str(), *weight))
    }

    pub fn influences(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sum(&self) -> f32 {
        self.0.values().sum()
    }

    /// Number of influences carrying a non-zero weight.
    pub fn nonzero_count(&self) -> usize {
        self.0.values().filter(|w| **w > 0.0).count()
    }

    /// The influence name if exactly one influence has a non-zero weight.
    pub fn sole_influence(&self) -> Option<&str> {
        let mut nonzero = self.0.iter().filter(|(_, w)| **w > 0.0);
        let (name, _) = nonzero.next()?;
        if nonzero.next().is_some() {
            return None;
        }
        Some(name.as_str())
    }

    /// Accumulate `other * scale` into this mapping.
    pub fn add_scaled(&mut self, other: &InfluenceWeights, scale: f32) {
        for (name, weight) in &other.0 {
            *self.0.entry(name.clone()).or_insert(0.0) += weight * scale;
        }
    }

    /// Largest absolute per-influence difference, treating absent entries as zero.
    pub fn max_difference(&self, other: &InfluenceWeights) -> f32 {
        let mut max = 0.0f32;
        for (name, weight) in &self.0 {
            max = max.max((weight - other.get(name)).abs());
        }
        for (name, weight) in &other.0 {
            if !self.0.contains_key(name) {
                max = max.max(weight.abs());
            }
        }
        max
    }

    /// Rescale so the weights sum to one.
    ///
    /// A mapping whose sum is not positive is returned unchanged.
    pub fn normalized(mut self) -> Self {
        let mut values: Vec<f32> = self.0.values().copied().collect();
        normalize_to_one(&mut values);
        for (slot, value) in self.0.values_mut().zip(values) {
            *slot = value;
        }
        self
    }
}

impl<S: Into<String>> FromIterator<(S, f32)> for InfluenceWeights {
    fn from_iter<T: IntoIterator<Item = (S, f32)>>(iter: T) -> Self {
        Self::from_pairs(iter)
    }
}

/// Normalize `values` in place so they sum to one.
///
/// After dividing by the total, any residual left by floating-point
/// rounding is folded into the smallest entry; if that would drive it
/// negative it is clamped to zero and the remainder taken from the largest.
pub fn normalize_to_one(values: &mut [f32]) {
    let total: f32 = values.iter().sum();
    if values.is_empty() || !(total > 0.0) || total == 1.0 {
        return;
    }

    for value in values.iter_mut() {
        *value /= total;
    }

    let normalized_total: f32 = values.iter().sum();
    if normalized_total == 1.0 {
        return;
    }

    let min_index = index_of_extreme(values, |a, b| a < b);
    let others: f32 = values
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != min_index)
        .map(|(_, v)| *v)
        .sum();
    let new_min = 1.0 - others;

    if new_min >= 0.0 {
        values[min_index] = new_min;
    } else {
        values[min_index] = 0.0;
        let max_index = index_of_extreme(values, |a, b| a > b);
        values[max_index] += new_min;
    }
}

fn index_of_extreme(values: &[f32], better: impl Fn(f32, f32) -> bool) -> usize {
    let mut best = 0;
    for (i, value) in values.iter().enumerate().skip(1) {
        if better(*value, values[best]) {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_to_one_sums_to_one() {
        let mut values = vec![0.1, 0.2, 0.3];
        normalize_to_one(&mut values);
        let sum: f32 = values.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!((values[2] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_to_one_leaves_zero_total() {
        let mut values = vec![0.0, 0.0];
        normalize_to_one(&mut values);
        assert_eq!(values, vec![0.0, 0.0]);
    }

    #[test]
    fn test_sole_influence() {
        let weights = InfluenceWeights::from_pairs([("hip", 1.0), ("knee", 0.0)]);
        assert_eq!(weights.sole_influence(), Some("hip"));
        assert_eq!(weights.nonzero_count(), 1);

        let mixed = InfluenceWeights::from_pairs([("hip", 0.5), ("knee", 0.5)]);
        assert_eq!(mixed.sole_influence(), None);
    }

    #[test]
    fn test_max_difference_covers_union() {
        let a = InfluenceWeights::from_pairs([("a", 0.7), ("b", 0.3)]);
        let b = InfluenceWeights::from_pairs([("a", 0.6), ("c", 0.4)]);
        assert!((a.max_difference(&b) - 0.4).abs() < 1e-6);
        assert!((b.max_difference(&a) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_add_scaled_then_normalize() {
        let mut acc = InfluenceWeights::new();
        acc.add_scaled(&InfluenceWeights::single("a"), 1.0);
        acc.add_scaled(&InfluenceWeights::single("b"), 0.5);
        let acc = acc.normalized();
        assert!((acc.sum() - 1.0).abs() < 1e-6);
        assert!(acc.get("a") > acc.get("b"));
    }
}

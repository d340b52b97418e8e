// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fitness records: per-objective scores of one evaluation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sink for objective scores.
///
/// Scores are heuristic distances in `[0, 1]`; `1.0` means covered.
pub trait FitnessRecord {
    /// Raise the score of `target` to `score` if it is higher than the
    /// current one, remembering the call that achieved it.
    fn update_target(&mut self, target: &str, score: f64, call_index: usize);

    /// Mark `target` as covered. Repeated calls have no further effect.
    fn cover_target(&mut self, target: &str);
}

/// Score of one objective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetScore {
    /// Best score seen.
    pub score: f64,
    /// Call that achieved it; `None` for whole-sequence objectives.
    pub call_index: Option<usize>,
}

/// In-memory [`FitnessRecord`] with deterministic iteration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessValue {
    targets: BTreeMap<String, TargetScore>,
}

impl FitnessValue {
    /// Empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Score of `target`, `0.0` if never touched.
    pub fn score(&self, target: &str) -> f64 {
        self.targets.get(target).map(|t| t.score).unwrap_or(0.0)
    }

    /// Full entry of `target`.
    pub fn get(&self, target: &str) -> Option<&TargetScore> {
        self.targets.get(target)
    }

    /// Whether `target` is fully covered.
    pub fn is_covered(&self, target: &str) -> bool {
        self.score(target) >= 1.0
    }

    /// Ids of all touched objectives, sorted.
    pub fn target_ids(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    /// Number of touched objectives.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Number of covered objectives.
    pub fn covered_count(&self) -> usize {
        self.targets.values().filter(|t| t.score >= 1.0).count()
    }
}

impl FitnessRecord for FitnessValue {
    fn update_target(&mut self, target: &str, score: f64, call_index: usize) {
        let score = score.clamp(0.0, 1.0);
        match self.targets.get_mut(target) {
            Some(existing) if existing.score >= score => {}
            Some(existing) => {
                existing.score = score;
                existing.call_index = Some(call_index);
            }
            None => {
                self.targets.insert(
                    target.to_string(),
                    TargetScore {
                        score,
                        call_index: Some(call_index),
                    },
                );
            }
        }
    }

    fn cover_target(&mut self, target: &str) {
        self.targets
            .entry(target.to_string())
            .and_modify(|t| t.score = 1.0)
            .or_insert(TargetScore {
                score: 1.0,
                call_index: None,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn update_keeps_maximum() {
        let mut fv = FitnessValue::new();
        fv.update_target("t", 0.5, 0);
        fv.update_target("t", 0.1, 1);
        assert_eq!(fv.score("t"), 0.5);
        assert_eq!(fv.get("t").unwrap().call_index, Some(0));
        fv.update_target("t", 1.0, 2);
        assert!(fv.is_covered("t"));
        assert_eq!(fv.get("t").unwrap().call_index, Some(2));
    }

    #[test]
    fn cover_after_update_keeps_index() {
        let mut fv = FitnessValue::new();
        fv.update_target("t", 0.3, 4);
        fv.cover_target("t");
        assert!(fv.is_covered("t"));
        assert_eq!(fv.get("t").unwrap().call_index, Some(4));
    }

    #[test]
    fn scores_are_clamped() {
        let mut fv = FitnessValue::new();
        fv.update_target("t", 7.0, 0);
        assert_eq!(fv.score("t"), 1.0);
    }

    proptest! {
        #[test]
        fn cover_is_idempotent(n in 1usize..10) {
            let mut once = FitnessValue::new();
            once.cover_target("x");
            let mut many = FitnessValue::new();
            for _ in 0..n {
                many.cover_target("x");
            }
            prop_assert_eq!(once, many);
        }

        #[test]
        fn update_order_does_not_matter(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
            let mut ab = FitnessValue::new();
            ab.update_target("t", a, 0);
            ab.update_target("t", b, 0);
            let mut ba = FitnessValue::new();
            ba.update_target("t", b, 0);
            ba.update_target("t", a, 0);
            prop_assert_eq!(ab.score("t"), ba.score("t"));
        }
    }
}

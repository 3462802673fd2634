//! Reward types and reward functions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::observation::Observation;

/// Scalar reward with optional decomposition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    /// Total scalar reward
    pub value: f64,
    /// Decomposed components for analysis
    #[serde(default)]
    pub components: RewardComponents,
}

/// Decomposed reward components
pub type RewardComponents = HashMap<String, f64>;

/// Trait for computing rewards from a state transition
pub trait RewardFunction: Send + Sync {
    /// State type for this reward function
    type State;

    /// Compute reward from state transition
    fn compute(&self, prev: &Self::State, current: &Self::State) -> Reward;
}

/// Reward equal to the change in player score between two observations
///
/// Uses the delta rather than the raw score so magnitude does not grow with
/// episode length.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreDelta;

impl RewardFunction for ScoreDelta {
    type State = Observation;

    fn compute(&self, prev: &Observation, current: &Observation) -> Reward {
        let delta = current.score() - prev.score();
        Reward {
            value: delta,
            components: HashMap::from([("score".to_string(), delta)]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::ObservationEncoder;

    fn with_score(score: f32) -> Observation {
        ObservationEncoder::new(1, 1).empty([0.5, 0.5, 0.0, 0.0, score, 3.0])
    }

    #[test]
    fn test_reward_is_delta_not_raw_score() {
        let reward = ScoreDelta.compute(&with_score(40.0), &with_score(50.0));
        assert_eq!(reward.value, 10.0);
        assert_eq!(reward.components.get("score"), Some(&10.0));
    }

    #[test]
    fn test_delta_exact_for_large_scores() {
        let encoder = ObservationEncoder::new(1, 1);
        let mut prev = encoder.empty([0.5, 0.5, 0.0, 0.0, 0.0, 3.0]);
        let mut current = prev.clone();
        prev.score = 16_777_216.0;
        current.score = 16_777_217.0;

        assert_eq!(ScoreDelta.compute(&prev, &current).value, 1.0);
    }

    #[test]
    fn test_unchanged_score_yields_zero() {
        let reward = ScoreDelta.compute(&with_score(7.0), &with_score(7.0));
        assert_eq!(reward.value, 0.0);
    }
}

//! Choice orchestration: pluggable reordering of candidate choices.
//!
//! The first element after reordering is the one explored now; the rest
//! become backtracks (in explicit mode).

use crate::config::ChoiceOrchestrationMode;
use crate::schedule::ChoiceVS;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// TD-learning step size.
const ALPHA: f64 = 0.5;

/// Q-values for (program state, choice) pairs, plus the trajectory of the
/// current iteration awaiting its reward.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChoiceLearningStats {
    qtable: HashMap<u64, f64>,
    program_state_hash: u64,
    trajectory: Vec<u64>,
}

/// Hash of a candidate's values, ignoring guards: two summaries offering
/// the same alternatives share a learning key.
pub fn choice_key(choice: &ChoiceVS) -> u64 {
    let mut acc = 0u64;
    for (value, _) in choice.guarded_values() {
        let mut hasher = ahash::AHasher::default();
        value.hash(&mut hasher);
        acc ^= hasher.finish();
    }
    acc
}

fn combine(state: u64, choice: u64) -> u64 {
    // splitmix-style mix so (state, choice) and (choice, state) differ
    let mut h = state ^ choice.wrapping_mul(0x9e3779b97f4a7c15);
    h ^= h >> 32;
    h.wrapping_mul(0x517cc1b727220a95)
}

impl ChoiceLearningStats {
    pub fn set_program_state_hash(&mut self, hash: u64) {
        self.program_state_hash = hash;
    }

    pub fn program_state_hash(&self) -> u64 {
        self.program_state_hash
    }

    pub fn q_value(&self, choice: &ChoiceVS) -> f64 {
        let key = combine(self.program_state_hash, choice_key(choice));
        self.qtable.get(&key).copied().unwrap_or(0.0)
    }

    /// Remember that the current iteration played `choice` in the current
    /// program state.
    pub fn record(&mut self, choice: &ChoiceVS) {
        self.trajectory
            .push(combine(self.program_state_hash, choice_key(choice)));
    }

    /// Reward the recorded trajectory with the iteration's outcome.
    pub fn reward(&mut self, reward: f64) {
        for key in self.trajectory.drain(..) {
            let q = self.qtable.entry(key).or_insert(0.0);
            *q += ALPHA * (reward - *q);
        }
    }

    pub fn num_q_values(&self) -> usize {
        self.qtable.len()
    }
}

/// A reordering policy over candidate choices.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ChoiceOrchestrator {
    None,
    Random { rng: Pcg64Mcg },
    QLearning,
    EpsilonGreedy { rng: Pcg64Mcg, epsilon: f64 },
}

impl ChoiceOrchestrator {
    pub fn new(mode: ChoiceOrchestrationMode, seed: u64, epsilon: f64) -> Self {
        match mode {
            ChoiceOrchestrationMode::None => ChoiceOrchestrator::None,
            ChoiceOrchestrationMode::Random => ChoiceOrchestrator::Random {
                rng: Pcg64Mcg::seed_from_u64(seed),
            },
            ChoiceOrchestrationMode::QLearning => ChoiceOrchestrator::QLearning,
            ChoiceOrchestrationMode::EpsilonGreedy => ChoiceOrchestrator::EpsilonGreedy {
                rng: Pcg64Mcg::seed_from_u64(seed),
                epsilon,
            },
        }
    }

    /// Reorder candidates in place; the head becomes the explored choice.
    pub fn reorder(
        &mut self,
        choices: &mut Vec<ChoiceVS>,
        _is_data: bool,
        learning: &ChoiceLearningStats,
    ) {
        match self {
            ChoiceOrchestrator::None => {}
            ChoiceOrchestrator::Random { rng } => {
                choices.shuffle(rng);
            }
            ChoiceOrchestrator::QLearning => {
                sort_greedy(choices, learning);
            }
            ChoiceOrchestrator::EpsilonGreedy { rng, epsilon } => {
                if rng.gen::<f64>() < *epsilon {
                    choices.shuffle(rng);
                } else {
                    sort_greedy(choices, learning);
                }
            }
        }
    }
}

fn sort_greedy(choices: &mut [ChoiceVS], learning: &ChoiceLearningStats) {
    // stable: equal Q keeps candidate order deterministic
    choices.sort_by(|a, b| learning.q_value(b).total_cmp(&learning.q_value(a)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ChoiceValue;
    use actra_runtime::MachineId;

    fn senders(n: usize) -> Vec<ChoiceVS> {
        (0..n)
            .map(|i| ChoiceVS::new(ChoiceValue::Sender(MachineId(i))))
            .collect()
    }

    #[test]
    fn none_preserves_order() {
        let mut o = ChoiceOrchestrator::new(ChoiceOrchestrationMode::None, 1, 0.1);
        let mut choices = senders(4);
        let before = choices.clone();
        o.reorder(&mut choices, false, &ChoiceLearningStats::default());
        assert_eq!(choices, before);
    }

    #[test]
    fn random_is_deterministic_per_seed() {
        let learning = ChoiceLearningStats::default();
        let mut a = ChoiceOrchestrator::new(ChoiceOrchestrationMode::Random, 42, 0.1);
        let mut b = ChoiceOrchestrator::new(ChoiceOrchestrationMode::Random, 42, 0.1);
        let mut ca = senders(6);
        let mut cb = senders(6);
        for _ in 0..3 {
            a.reorder(&mut ca, false, &learning);
            b.reorder(&mut cb, false, &learning);
            assert_eq!(ca, cb);
        }
    }

    #[test]
    fn qlearning_plays_highest_q_first() {
        let mut learning = ChoiceLearningStats::default();
        learning.set_program_state_hash(7);
        let choices = senders(3);
        learning.record(&choices[2]);
        learning.reward(1.0);

        let mut o = ChoiceOrchestrator::new(ChoiceOrchestrationMode::QLearning, 0, 0.1);
        let mut reordered = choices.clone();
        o.reorder(&mut reordered, false, &learning);
        assert_eq!(reordered[0], choices[2]);
    }

    #[test]
    fn reward_moves_q_toward_outcome() {
        let mut learning = ChoiceLearningStats::default();
        let choice = senders(1).remove(0);
        learning.record(&choice);
        learning.reward(1.0);
        let q1 = learning.q_value(&choice);
        assert!(q1 > 0.0);
        learning.record(&choice);
        learning.reward(1.0);
        assert!(learning.q_value(&choice) > q1);
    }
}

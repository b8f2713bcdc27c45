//! Search statistics: per-iteration and per-depth accounting.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Statistics for one step depth.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DepthStats {
    pub num_states: u64,
    pub num_messages: u64,
    pub num_messages_merged: u64,
    pub num_messages_explored: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IterationStats {
    pub iter: usize,
    /// Choice depth this iteration resumed from.
    pub backtrack_depth: usize,
    /// The iteration reached a terminal state (vs. being cut at the bound).
    pub completed: bool,
    pub max_depth: usize,
}

/// Aggregates reported at the end of a run.
#[derive(Clone, Debug, Default)]
pub struct TotalStats {
    pub completed: bool,
    pub max_depth: usize,
    pub num_iterations: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchStats {
    iterations: Vec<IterationStats>,
    per_depth: BTreeMap<usize, DepthStats>,
    max_depth: usize,
    num_sticky_steps: u64,
}

impl SearchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_new_iteration(&mut self, iter: usize, backtrack_depth: usize) {
        self.iterations.push(IterationStats {
            iter,
            backtrack_depth,
            completed: false,
            max_depth: 0,
        });
    }

    pub fn set_iteration_completed(&mut self) {
        if let Some(current) = self.iterations.last_mut() {
            current.completed = true;
        }
    }

    pub fn add_depth_statistics(&mut self, depth: usize, stats: DepthStats) {
        let entry = self.per_depth.entry(depth).or_default();
        entry.num_states += stats.num_states;
        entry.num_messages += stats.num_messages;
        entry.num_messages_merged += stats.num_messages_merged;
        entry.num_messages_explored += stats.num_messages_explored;
        if depth > self.max_depth {
            self.max_depth = depth;
        }
        if let Some(current) = self.iterations.last_mut() {
            if depth > current.max_depth {
                current.max_depth = depth;
            }
        }
    }

    pub fn note_sticky_step(&mut self) {
        self.num_sticky_steps += 1;
    }

    pub fn num_sticky_steps(&self) -> u64 {
        self.num_sticky_steps
    }

    pub fn iterations(&self) -> &[IterationStats] {
        &self.iterations
    }

    pub fn total(&self) -> TotalStats {
        TotalStats {
            completed: !self.iterations.is_empty()
                && self.iterations.iter().all(|i| i.completed),
            max_depth: self.max_depth,
            num_iterations: self.iterations.len(),
        }
    }

    pub fn reset_stats(&mut self) {
        self.iterations.clear();
        self.per_depth.clear();
        self.max_depth = 0;
        self.num_sticky_steps = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_require_every_iteration_completed() {
        let mut s = SearchStats::new();
        s.start_new_iteration(1, 0);
        s.set_iteration_completed();
        s.start_new_iteration(2, 3);
        assert!(!s.total().completed);
        s.set_iteration_completed();
        assert!(s.total().completed);
        assert_eq!(s.total().num_iterations, 2);
    }

    #[test]
    fn depth_stats_accumulate() {
        let mut s = SearchStats::new();
        s.start_new_iteration(1, 0);
        s.add_depth_statistics(
            3,
            DepthStats {
                num_states: 2,
                num_messages: 1,
                ..Default::default()
            },
        );
        s.add_depth_statistics(
            3,
            DepthStats {
                num_states: 1,
                ..Default::default()
            },
        );
        assert_eq!(s.total().max_depth, 3);
        assert_eq!(s.iterations()[0].max_depth, 3);
    }
}

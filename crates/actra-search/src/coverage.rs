//! Coverage accounting: how much of the choice tree has been explored.
//!
//! Each choice depth records the width of the choice when it was first
//! created; a finished iteration contributes the product of chosen/total
//! fractions along its path. Widths are frozen at creation, so the leaf
//! weights of a fully explored tree sum to exactly one.

use serde::{Deserialize, Serialize};

/// Named coverage goals, checked highest first.
const GOALS: &[(f64, &str)] = &[
    (1.0, "full"),
    (0.99, "high"),
    (0.9, "medium"),
    (0.5, "low"),
    (0.0, "none"),
];

/// Per-choice-depth bookkeeping for the current path.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChoiceDepthStats {
    /// Step depth at which this choice was made.
    pub step_depth: usize,
    /// Alternatives explored by the current iteration at this depth.
    pub num_chosen: usize,
    /// Alternatives left behind as backtracks.
    pub num_backtrack: usize,
    /// Width of the choice when first created; frozen afterwards.
    pub num_total: usize,
    pub is_data: bool,
    /// The current iteration generated this choice fresh.
    pub new_choice: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CoverageStats {
    per_choice_depth: Vec<ChoiceDepthStats>,
    covered: f64,
}

impl CoverageStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a choice selection at `choice_depth`.
    pub fn update_depth_coverage(
        &mut self,
        step_depth: usize,
        choice_depth: usize,
        num_chosen: usize,
        num_backtrack: usize,
        is_data: bool,
        new_choice: bool,
    ) {
        if self.per_choice_depth.len() <= choice_depth {
            self.per_choice_depth
                .resize_with(choice_depth + 1, ChoiceDepthStats::default);
        }
        let stats = &mut self.per_choice_depth[choice_depth];
        if new_choice || stats.num_total == 0 {
            stats.num_total = num_chosen + num_backtrack;
        }
        stats.step_depth = step_depth;
        stats.num_chosen = num_chosen;
        stats.num_backtrack = num_backtrack;
        stats.is_data = is_data;
        stats.new_choice = new_choice;
    }

    /// Fold the finished iteration's leaf into the covered total and return
    /// the leaf's weight (also the learning reward).
    pub fn update_iteration_coverage(&mut self, last_choice_depth: Option<usize>) -> f64 {
        let weight = self.path_fraction_upto(last_choice_depth);
        self.covered = (self.covered + weight).min(1.0);
        weight
    }

    /// Weight of the explored prefix through `choice_depth` (1.0 for none).
    pub fn path_coverage_at_depth(&self, choice_depth: Option<usize>) -> f64 {
        self.path_fraction_upto(choice_depth)
    }

    fn path_fraction_upto(&self, choice_depth: Option<usize>) -> f64 {
        let Some(upto) = choice_depth else {
            return 1.0;
        };
        let mut weight = 1.0;
        for stats in self.per_choice_depth.iter().take(upto + 1) {
            if stats.num_total > 0 {
                weight *= stats.num_chosen as f64 / stats.num_total as f64;
            }
        }
        weight
    }

    /// Forget path bookkeeping from `choice_depth` on (the choices there
    /// have been fully handled and cleared from the schedule).
    pub fn reset_path_coverage(&mut self, choice_depth: usize) {
        self.per_choice_depth.truncate(choice_depth);
    }

    pub fn reset_coverage(&mut self) {
        self.per_choice_depth.clear();
        self.covered = 0.0;
    }

    /// Estimated fraction of the choice tree explored so far.
    pub fn estimated_coverage(&self) -> f64 {
        self.covered.clamp(0.0, 1.0)
    }

    pub fn coverage_goal_achieved(&self) -> &'static str {
        let covered = self.estimated_coverage();
        for (threshold, name) in GOALS {
            if covered >= *threshold {
                return name;
            }
        }
        "none"
    }

    pub fn max_coverage_goal(&self) -> &'static str {
        GOALS[0].1
    }

    /// Force the covered total to the goal (used when a run proves the whole
    /// tree explored, so float residue cannot understate the verdict).
    pub fn mark_complete(&mut self) {
        self.covered = 1.0;
    }

    pub fn per_choice_depth_stats(&self) -> Vec<ChoiceDepthStats> {
        self.per_choice_depth.clone()
    }

    pub fn set_per_choice_depth_stats(&mut self, stats: Vec<ChoiceDepthStats>) {
        self.per_choice_depth = stats;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_run_covers_everything() {
        let mut c = CoverageStats::new();
        for d in 0..5 {
            c.update_depth_coverage(d, d, 1, 0, false, true);
        }
        let w = c.update_iteration_coverage(Some(4));
        assert_eq!(w, 1.0);
        assert_eq!(c.estimated_coverage(), 1.0);
        assert_eq!(c.coverage_goal_achieved(), "full");
    }

    #[test]
    fn binary_choice_halves_then_sums_to_one() {
        let mut c = CoverageStats::new();
        c.update_depth_coverage(0, 0, 1, 1, true, true);
        assert_eq!(c.update_iteration_coverage(Some(0)), 0.5);
        // second iteration resumes from the backtrack: total width is kept
        c.update_depth_coverage(0, 0, 1, 0, true, false);
        assert_eq!(c.update_iteration_coverage(Some(0)), 0.5);
        assert_eq!(c.estimated_coverage(), 1.0);
    }

    #[test]
    fn coverage_stays_in_unit_interval() {
        let mut c = CoverageStats::new();
        c.update_depth_coverage(0, 0, 1, 0, false, true);
        for _ in 0..5 {
            c.update_iteration_coverage(Some(0));
        }
        assert!(c.estimated_coverage() <= 1.0);
        assert!(c.estimated_coverage() >= 0.0);
    }

    #[test]
    fn prefix_weight_shrinks_with_depth() {
        let mut c = CoverageStats::new();
        c.update_depth_coverage(0, 0, 1, 1, false, true);
        c.update_depth_coverage(1, 1, 1, 3, false, true);
        assert_eq!(c.path_coverage_at_depth(None), 1.0);
        assert_eq!(c.path_coverage_at_depth(Some(0)), 0.5);
        assert_eq!(c.path_coverage_at_depth(Some(1)), 0.125);
    }

    #[test]
    fn reset_path_coverage_truncates() {
        let mut c = CoverageStats::new();
        c.update_depth_coverage(0, 0, 1, 0, false, true);
        c.update_depth_coverage(1, 1, 1, 1, false, true);
        c.reset_path_coverage(1);
        assert_eq!(c.per_choice_depth_stats().len(), 1);
    }
}

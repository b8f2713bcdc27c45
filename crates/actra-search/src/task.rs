//! Backtrack tasks: frozen schedule prefixes queued for later exploration.
//!
//! Tasks form a tree stored in a flat vector indexed by id; parent/child
//! links are ids, so serialization is trivial and cycles are impossible.

use crate::config::TaskOrchestrationMode;
use crate::coverage::ChoiceDepthStats;
use crate::schedule::Choice;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BacktrackTask {
    pub id: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Step depth of the backtrack point.
    pub depth: usize,
    /// Choice depth of the backtrack point.
    pub choice_depth: usize,
    /// The frozen schedule prefix.
    pub choices: Vec<Choice>,
    pub per_choice_depth_stats: Vec<ChoiceDepthStats>,
    /// Weight of the explored prefix leading here, in (0, 1].
    pub prefix_coverage: f64,
    pub priority: f64,
    pub num_backtracks: usize,
    pub num_data_backtracks: usize,
    pub completed: bool,
}

impl BacktrackTask {
    fn root() -> Self {
        Self {
            id: 0,
            parent: None,
            children: Vec::new(),
            depth: 0,
            choice_depth: 0,
            choices: Vec::new(),
            per_choice_depth_stats: Vec::new(),
            prefix_coverage: 1.0,
            priority: 1.0,
            num_backtracks: 0,
            num_data_backtracks: 0,
            completed: false,
        }
    }

    pub fn is_initial(&self) -> bool {
        self.id == 0
    }

    /// Free the frozen schedule once every child has been registered.
    fn cleanup(&mut self) {
        self.choices.clear();
        self.per_choice_depth_stats.clear();
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskManager {
    mode: TaskOrchestrationMode,
    epsilon: f64,
    all_tasks: Vec<BacktrackTask>,
    pending: Vec<usize>,
    finished: Vec<usize>,
    latest_task_id: usize,
    num_pending_backtracks: usize,
    num_pending_data_backtracks: usize,
    rng: Pcg64Mcg,
}

impl TaskManager {
    pub fn new(mode: TaskOrchestrationMode, seed: u64, epsilon: f64) -> Self {
        Self {
            mode,
            epsilon,
            all_tasks: Vec::new(),
            pending: Vec::new(),
            finished: Vec::new(),
            latest_task_id: 0,
            num_pending_backtracks: 0,
            num_pending_data_backtracks: 0,
            rng: Pcg64Mcg::seed_from_u64(seed ^ 0xb61d_9c8f_3a75_02e4),
        }
    }

    /// Forget pending work (start of a fresh search or resume).
    pub fn reset_pending(&mut self) {
        self.pending.clear();
        self.num_pending_backtracks = 0;
        self.num_pending_data_backtracks = 0;
    }

    /// The task whose subtree the current iteration just finished. Created
    /// on first use; thereafter the latest task picked by `next_task`.
    pub fn complete_parent(&mut self, prefix_coverage: f64) -> usize {
        if self.all_tasks.is_empty() {
            self.all_tasks.push(BacktrackTask::root());
        }
        let id = self.latest_task_id;
        let task = &mut self.all_tasks[id];
        task.prefix_coverage = prefix_coverage.clamp(0.0, 1.0).max(f64::MIN_POSITIVE);
        task.completed = true;
        self.finished.push(id);
        debug!(task = id, "task finished");
        id
    }

    /// Register a new pending task holding `choices` frozen at the given
    /// backtrack point.
    #[allow(clippy::too_many_arguments)]
    pub fn create_task(
        &mut self,
        parent: usize,
        depth: usize,
        choice_depth: usize,
        choices: Vec<Choice>,
        per_choice_depth_stats: Vec<ChoiceDepthStats>,
        prefix_coverage: f64,
    ) -> usize {
        let id = self.all_tasks.len();
        let num_backtracks: usize = choices.iter().map(|c| c.num_backtracks()).sum();
        let num_data_backtracks: usize = choices
            .iter()
            .filter(|c| c.is_data)
            .map(|c| c.num_backtracks())
            .sum();
        let task = BacktrackTask {
            id,
            parent: Some(parent),
            children: Vec::new(),
            depth,
            choice_depth,
            choices,
            per_choice_depth_stats,
            prefix_coverage,
            priority: prefix_coverage,
            num_backtracks,
            num_data_backtracks,
            completed: false,
        };
        self.all_tasks[parent].children.push(id);
        self.num_pending_backtracks += task.num_backtracks;
        self.num_pending_data_backtracks += task.num_data_backtracks;
        self.all_tasks.push(task);
        self.pending.push(id);
        id
    }

    /// Pick the next pending task under the orchestration mode, remove it
    /// from the pending set, and hand back its frozen schedule.
    pub fn next_task(&mut self) -> Option<(usize, Vec<Choice>, Vec<ChoiceDepthStats>)> {
        if self.pending.is_empty() {
            return None;
        }
        let pos = match self.mode {
            // DepthFirst never queues tasks; any pick is fine if it happens.
            TaskOrchestrationMode::DepthFirst => 0,
            TaskOrchestrationMode::Random => self.rng.gen_range(0..self.pending.len()),
            TaskOrchestrationMode::CoverageAStar => self.best_priority_pos(),
            TaskOrchestrationMode::Learn => {
                if self.rng.gen::<f64>() < self.epsilon {
                    self.rng.gen_range(0..self.pending.len())
                } else {
                    self.best_priority_pos()
                }
            }
        };
        let id = self.pending.swap_remove(pos);
        let (choices, stats) = {
            let task = &mut self.all_tasks[id];
            debug_assert!(!task.completed);
            (
                std::mem::take(&mut task.choices),
                std::mem::take(&mut task.per_choice_depth_stats),
            )
        };
        let task_backtracks = self.all_tasks[id].num_backtracks;
        let task_data = self.all_tasks[id].num_data_backtracks;
        self.num_pending_backtracks -= task_backtracks;
        self.num_pending_data_backtracks -= task_data;
        self.latest_task_id = id;
        if let Some(parent) = self.all_tasks[id].parent {
            self.all_tasks[parent].cleanup();
        }
        Some((id, choices, stats))
    }

    fn best_priority_pos(&self) -> usize {
        let mut best = 0;
        for (i, &id) in self.pending.iter().enumerate() {
            if self.all_tasks[id].priority > self.all_tasks[self.pending[best]].priority {
                best = i;
            }
        }
        best
    }

    pub fn latest_task_id(&self) -> usize {
        self.latest_task_id
    }

    pub fn all_tasks(&self) -> &[BacktrackTask] {
        &self.all_tasks
    }

    pub fn pending(&self) -> &[usize] {
        &self.pending
    }

    pub fn finished(&self) -> &[usize] {
        &self.finished
    }

    pub fn num_pending_backtracks(&self) -> usize {
        self.num_pending_backtracks
    }

    pub fn num_pending_data_backtracks(&self) -> usize {
        self.num_pending_data_backtracks
    }

    /// Accounting invariant: the pending counter equals the sum over
    /// pending tasks, and no task is both pending and finished.
    pub fn check_accounting(&self) -> bool {
        let sum: usize = self
            .pending
            .iter()
            .map(|&id| self.all_tasks[id].num_backtracks)
            .sum();
        let disjoint = self.pending.iter().all(|id| !self.finished.contains(id));
        sum == self.num_pending_backtracks && disjoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{ChoiceVS, ChoiceValue};

    fn choices_with_backtracks(n: usize) -> Vec<Choice> {
        let mut choice = Choice::default();
        choice.chosen = ChoiceVS::new(ChoiceValue::Bool(true));
        choice.backtrack = (0..n)
            .map(|_| ChoiceVS::new(ChoiceValue::Bool(false)))
            .collect();
        vec![choice]
    }

    #[test]
    fn accounting_tracks_pending_sum() {
        let mut tm = TaskManager::new(TaskOrchestrationMode::Random, 7, 0.1);
        let parent = tm.complete_parent(1.0);
        tm.create_task(parent, 1, 1, choices_with_backtracks(2), vec![], 0.5);
        tm.create_task(parent, 3, 3, choices_with_backtracks(1), vec![], 0.25);
        assert_eq!(tm.num_pending_backtracks(), 3);
        assert!(tm.check_accounting());

        let (_, _, _) = tm.next_task().unwrap();
        assert!(tm.check_accounting());
        let _ = tm.next_task().unwrap();
        assert_eq!(tm.num_pending_backtracks(), 0);
        assert!(tm.next_task().is_none());
    }

    #[test]
    fn coverage_astar_pops_highest_priority() {
        let mut tm = TaskManager::new(TaskOrchestrationMode::CoverageAStar, 0, 0.1);
        let parent = tm.complete_parent(1.0);
        tm.create_task(parent, 1, 1, choices_with_backtracks(1), vec![], 0.125);
        let big = tm.create_task(parent, 2, 2, choices_with_backtracks(1), vec![], 0.5);
        let (id, _, _) = tm.next_task().unwrap();
        assert_eq!(id, big);
    }

    #[test]
    fn parent_is_finished_before_children_pend() {
        let mut tm = TaskManager::new(TaskOrchestrationMode::Random, 0, 0.1);
        let parent = tm.complete_parent(1.0);
        assert!(tm.all_tasks()[parent].completed);
        let child = tm.create_task(parent, 1, 1, choices_with_backtracks(1), vec![], 0.5);
        assert!(tm.finished().contains(&parent));
        assert!(tm.pending().contains(&child));
        assert_eq!(tm.all_tasks()[parent].children, vec![child]);
    }

    #[test]
    fn random_pick_is_deterministic_per_seed() {
        let run = |seed| {
            let mut tm = TaskManager::new(TaskOrchestrationMode::Random, seed, 0.1);
            let parent = tm.complete_parent(1.0);
            for d in 0..5 {
                tm.create_task(parent, d, d, choices_with_backtracks(1), vec![], 0.5);
            }
            let mut order = Vec::new();
            while let Some((id, _, _)) = tm.next_task() {
                order.push(id);
            }
            order
        };
        assert_eq!(run(3), run(3));
    }
}

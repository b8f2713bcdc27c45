//! Configuration for the search scheduler.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How choices within a step are reordered before splitting into chosen
/// and backtrack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChoiceOrchestrationMode {
    /// Preserve candidate order.
    None,
    /// Shuffle with the seeded PRNG.
    Random,
    /// Sort by learned Q-values, greedy first.
    QLearning,
    /// Q-greedy with probability 1 - epsilon, uniform otherwise.
    EpsilonGreedy,
}

/// How the next backtrack task is selected across iterations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskOrchestrationMode {
    /// In-schedule backtracking only; the task manager stays idle.
    DepthFirst,
    /// Uniform pick from pending tasks.
    Random,
    /// Highest-priority pending task (priority from prefix coverage).
    CoverageAStar,
    /// Best-priority with probability 1 - epsilon, uniform otherwise.
    Learn,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymmetryMode {
    None,
    /// Merge all symmetry classes before selecting each sender.
    Full,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateCachingMode {
    None,
    /// Hash each variable's summary to a compact key.
    Fast,
    /// Fully concretize variables before hashing.
    Exact,
}

/// Scheduler configuration. Field semantics follow the option table of the
/// engine's interface contract; everything is serialized into checkpoints
/// so a resumed run sees the run it continues.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    pub choice_orchestration: ChoiceOrchestrationMode,
    pub task_orchestration: TaskOrchestrationMode,
    pub symmetry_mode: SymmetryMode,
    pub state_caching: StateCachingMode,
    /// Explore all alternatives of each choice at once as one disjunction.
    pub symbolic: bool,
    /// Record restorable state at each choice; disabling means backtracks
    /// are never revisited.
    pub use_backtrack: bool,
    /// Hard cap on step depth per iteration.
    pub max_step_bound: usize,
    /// Treat hitting the step bound as an error.
    pub fail_on_max_step_bound: bool,
    /// Total iterations across resumes (0 = unlimited).
    pub max_executions: usize,
    /// Bound on backtrack tasks created per iteration (0 = unlimited).
    pub max_backtrack_tasks_per_execution: usize,
    /// Logging detail, 0-5+.
    pub verbosity: u8,
    /// PRNG seed for every randomized policy.
    pub seed: u64,
    /// Wall-clock budget in seconds (0 = unlimited).
    pub timeout_secs: u64,
    /// Exploration rate for epsilon-greedy policies.
    pub epsilon: f64,
    /// Where checkpoint files go, when checkpointing is requested.
    pub output_dir: Option<PathBuf>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            choice_orchestration: ChoiceOrchestrationMode::None,
            task_orchestration: TaskOrchestrationMode::DepthFirst,
            symmetry_mode: SymmetryMode::None,
            state_caching: StateCachingMode::None,
            symbolic: false,
            use_backtrack: true,
            max_step_bound: 10_000,
            fail_on_max_step_bound: false,
            max_executions: 0,
            max_backtrack_tasks_per_execution: 0,
            verbosity: 0,
            seed: 0,
            timeout_secs: 0,
            epsilon: 0.1,
            output_dir: None,
        }
    }
}

impl SearchConfig {
    pub fn state_caching_enabled(&self) -> bool {
        self.state_caching != StateCachingMode::None
    }

    pub fn learning_enabled(&self) -> bool {
        matches!(
            self.choice_orchestration,
            ChoiceOrchestrationMode::QLearning | ChoiceOrchestrationMode::EpsilonGreedy
        )
    }
}

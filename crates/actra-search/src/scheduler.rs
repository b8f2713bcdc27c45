//! The explicit search scheduler: outer iteration loop, per-step scheduling,
//! backtracking, and task orchestration across iterations.

use crate::cache::{program_state_hash, StateCache};
use crate::checkpoint::{
    backtrack_file_name, current_file_name, read_checkpoint, write_checkpoint, BacktrackWriter,
    Checkpoint,
};
use crate::config::{SearchConfig, SymmetryMode, TaskOrchestrationMode};
use crate::coverage::CoverageStats;
use crate::error::{SearchError, SearchResult};
use crate::monitor::{current_memory_mb, TimeMonitor};
use crate::schedule::{ChoiceVS, ChoiceValue, SavedState, Schedule};
use crate::select::ChoiceSelector;
use crate::stats::{DepthStats, SearchStats};
use crate::task::TaskManager;
use actra_runtime::{EffectCtx, MachineId, Message, Program, Runtime, SrcState};
use actra_solver::{PrimitiveVS, SolverStats};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Drives the program under test forward one scheduling step at a time,
/// recording every choice on the schedule and revisiting alternatives via
/// in-schedule backtracking and the backtrack task tree.
pub struct SearchScheduler {
    config: SearchConfig,
    program: Arc<dyn Program>,
    runtime: Runtime,
    selector: ChoiceSelector,
    tasks: TaskManager,
    cache: StateCache,
    stats: SearchStats,
    solver_stats: SolverStats,
    monitor: TimeMonitor,
    stop_flag: Option<Arc<AtomicBool>>,
    iter: usize,
    start_iter: usize,
    /// Step depth: advances once per non-sticky step.
    depth: usize,
    /// Choice depth the last backtrack restored to.
    backtrack_depth: usize,
    /// The current iteration reached a terminal state.
    done: bool,
    /// The outer loop is finished.
    is_done_iterating: bool,
    /// The current step did not advance the step depth.
    sticky_step: bool,
    result: String,
    /// Machine states at the start of the current step.
    src_state: SrcState,
}

impl SearchScheduler {
    pub fn new(config: SearchConfig, program: Arc<dyn Program>) -> Self {
        Self {
            runtime: Runtime::new(config.symmetry_mode != SymmetryMode::None),
            selector: ChoiceSelector::new(&config),
            tasks: TaskManager::new(config.task_orchestration, config.seed, config.epsilon),
            cache: StateCache::new(config.state_caching),
            stats: SearchStats::new(),
            solver_stats: SolverStats::default(),
            monitor: TimeMonitor::new(config.timeout_secs),
            stop_flag: None,
            iter: 0,
            start_iter: 0,
            depth: 0,
            backtrack_depth: 0,
            done: false,
            is_done_iterating: false,
            sticky_step: false,
            result: "incomplete".into(),
            src_state: Vec::new(),
            program,
            config,
        }
    }

    /// Cooperative cancellation: checked between iterations.
    pub fn set_stop_flag(&mut self, flag: Arc<AtomicBool>) {
        self.stop_flag = Some(flag);
    }

    /// Run the search from scratch until the iteration space is exhausted.
    pub fn do_search(&mut self) -> SearchResult<()> {
        self.tasks.reset_pending();
        self.result = "incomplete".into();
        self.iter += 1;
        info!(iter = self.iter, "starting search");
        self.initialize_search()?;
        let mut initial_run = true;
        while !self.is_done_iterating {
            if initial_run {
                initial_run = false;
            } else {
                self.iter += 1;
                debug!(iter = self.iter, depth = self.depth, "starting execution");
            }
            self.stats.start_new_iteration(self.iter, self.backtrack_depth);
            self.perform_search()?;
            self.check_liveness(false)?;
            self.summarize_iteration(self.backtrack_depth)?;
        }
        self.record_result();
        info!(result = %self.result, iterations = self.iter - self.start_iter, "search complete");
        Ok(())
    }

    /// Continue a search restored from a checkpoint.
    pub fn resume_search(&mut self) -> SearchResult<()> {
        self.tasks.reset_pending();
        self.is_done_iterating = false;
        self.start_iter = self.iter;
        self.reset_stats();
        self.selector.schedule.recount_backtracks();
        // a checkpoint taken at a terminal state replays one trivial
        // iteration first; its coverage is discarded
        let mut reset_coverage_after_initial = self.is_done();
        let mut initial_run = true;
        while !self.is_done_iterating {
            if initial_run {
                initial_run = false;
                info!(iter = self.iter, depth = self.depth, "resuming execution");
            } else {
                self.iter += 1;
                debug!(iter = self.iter, depth = self.depth, "starting execution");
            }
            self.stats.start_new_iteration(self.iter, self.backtrack_depth);
            self.perform_search()?;
            self.check_liveness(false)?;
            self.summarize_iteration(self.backtrack_depth)?;
            if reset_coverage_after_initial {
                reset_coverage_after_initial = false;
                self.selector.coverage.reset_coverage();
            }
        }
        self.record_result();
        info!(result = %self.result, iterations = self.iter - self.start_iter, "resumed search complete");
        Ok(())
    }

    /// One iteration: step until a terminal state or the step bound.
    fn perform_search(&mut self) -> SearchResult<()> {
        self.selector.schedule.recount_backtracks();
        while !self.is_done() {
            self.print_progress(false);
            if self.depth >= self.config.max_step_bound {
                if self.config.fail_on_max_step_bound {
                    return Err(SearchError::StepBoundExceeded {
                        bound: self.config.max_step_bound,
                    });
                }
                debug!(depth = self.depth, "step bound reached, iteration cut");
                self.selector.schedule.recount_backtracks();
                return Ok(());
            }
            self.step()?;
        }
        self.selector.schedule.recount_backtracks();
        if self.done {
            self.stats.set_iteration_completed();
        }
        Ok(())
    }

    /// One atomic scheduling step.
    fn step(&mut self) -> SearchResult<()> {
        self.src_state.clear();

        let mut num_states = 0u64;
        let mut num_distinct = 0u64;
        if self.config.state_caching_enabled() {
            self.store_src_state();
            let (states, distinct) = if self.config.symbolic {
                self.cache.enumerate_symbolic(
                    &self.src_state,
                    self.sticky_step,
                    self.selector.choice_depth,
                    self.backtrack_depth,
                    &mut self.solver_stats,
                )
            } else {
                self.cache.enumerate_explicit(
                    &self.src_state,
                    self.sticky_step,
                    self.selector.choice_depth,
                    self.backtrack_depth,
                    &mut self.solver_stats,
                )
            };
            num_states = states;
            num_distinct = distinct;
        }

        if self.config.symmetry_mode == SymmetryMode::Full {
            self.runtime.symmetry.merge_all_classes();
        }

        if self.config.use_backtrack {
            self.store_src_state();
            let saved = SavedState {
                machine_states: self.src_state.clone(),
                counters: self.runtime.counters().clone(),
                symmetry: (self.config.symmetry_mode != SymmetryMode::None)
                    .then(|| self.runtime.symmetry.snapshot()),
            };
            self.selector.schedule.set_step_state(
                self.depth,
                self.selector.choice_depth,
                Some(saved),
            );
        } else {
            self.selector
                .schedule
                .set_step_state(self.depth, self.selector.choice_depth, None);
        }

        self.runtime.gc_halted_targets();

        self.selector.step_depth = self.depth;
        let choices = self.get_next_sender();
        if choices.is_empty_vs() {
            self.done = true;
            debug!(depth = self.depth, "finished execution");
            return Ok(());
        }

        self.monitor.check_timeout()?;

        if self.config.learning_enabled() {
            self.store_src_state();
            self.selector
                .learning
                .set_program_state_hash(program_state_hash(&self.src_state));
        }

        if self.config.symmetry_mode != SymmetryMode::None {
            self.runtime
                .symmetry
                .update_after_choice(&sender_machines(&choices));
        }

        let mut effect: Option<Message> = None;
        let mut effects: Vec<Message> = Vec::new();
        for (value, guard) in choices.guarded_values() {
            let machine = match value {
                ChoiceValue::Sender(id) => *id,
                _ => continue,
            };
            let Some(removed) = self.runtime.rm_buffer(machine, guard) else {
                continue;
            };
            // the symmetry set follows the dispatched target only on the
            // explicit path
            if self.config.symmetry_mode == SymmetryMode::Full && !self.config.symbolic {
                self.runtime.symmetry.update_after_choice(&removed.target);
            }
            trace!(machine = %machine, "message removed");
            match effect {
                None => effect = Some(removed),
                Some(_) => effects.push(removed),
            }
        }
        let Some(effect) = effect else {
            self.done = true;
            return Ok(());
        };
        let num_merged = effects.len();
        let effect = effect.merge(effects);

        self.sticky_step = false;
        if num_merged == 0
            && (!effect.create_guard().is_false() || !effect.sync_guard().is_false())
        {
            self.sticky_step = true;
            self.stats.note_sticky_step();
        }
        if !self.sticky_step {
            self.depth += 1;
        }

        trace!(depth = self.depth, sticky = self.sticky_step, "schedule step");
        self.selector.step_depth = self.depth;
        self.perform_effect(effect)?;

        self.stats.add_depth_statistics(
            self.depth,
            DepthStats {
                num_states,
                num_messages: 1 + num_merged as u64,
                num_messages_merged: num_merged as u64,
                num_messages_explored: 1,
            },
        );
        if self.config.verbosity > 4 {
            debug!(
                depth = self.depth,
                states = num_states,
                distinct = num_distinct,
                total_states = self.cache.total_states,
                total_distinct = self.cache.total_distinct_states,
                "collect stats"
            );
        }
        Ok(())
    }

    /// Select the next sender at the current choice depth.
    fn get_next_sender(&mut self) -> ChoiceVS {
        let mut candidates = self.runtime.sender_candidates();
        if self.config.state_caching_enabled() {
            candidates = self.cache.filter_distinct(candidates);
        }
        let fresh: Vec<ChoiceVS> = candidates
            .into_iter()
            .map(|c| c.map(|id| ChoiceValue::Sender(*id)))
            .collect();
        let symmetry = (self.config.symmetry_mode != SymmetryMode::None)
            .then(|| &self.runtime.symmetry);
        self.selector.get_next(false, symmetry, move || fresh)
    }

    /// Dispatch one merged effect message on its target machines.
    fn perform_effect(&mut self, effect: Message) -> SearchResult<()> {
        let program = Arc::clone(&self.program);
        for (event, event_guard) in effect.event.guarded_values() {
            let targets = effect.target.restrict(event_guard);
            for (target, target_guard) in targets.guarded_values() {
                let payload = effect.payload.as_ref().map(|p| p.restrict(target_guard));
                if event.is_create() {
                    let machine = self.runtime.machine_mut(*target);
                    machine.started = machine.started.or(target_guard);
                    let mut ctx = EffectCtx {
                        runtime: &mut self.runtime,
                        data: &mut self.selector,
                        self_id: *target,
                        guard: target_guard.clone(),
                    };
                    program.on_start(&mut ctx)?;
                } else {
                    let mut ctx = EffectCtx {
                        runtime: &mut self.runtime,
                        data: &mut self.selector,
                        self_id: *target,
                        guard: target_guard.clone(),
                    };
                    program.on_event(&mut ctx, event, payload.as_ref())?;
                }
            }
        }
        Ok(())
    }

    /// Create the initial machine set: the main machine starts immediately.
    fn initialize_search(&mut self) -> SearchResult<()> {
        let interface = self.program.main_interface().to_string();
        let main = self.runtime.setup_machine(&interface);
        self.runtime.machine_mut(main).started = actra_solver::Guard::always();
        let program = Arc::clone(&self.program);
        let mut ctx = EffectCtx {
            runtime: &mut self.runtime,
            data: &mut self.selector,
            self_id: main,
            guard: actra_solver::Guard::always(),
        };
        program.on_start(&mut ctx)?;
        Ok(())
    }

    /// End-of-iteration bookkeeping: termination gates, task creation and
    /// selection, then in-schedule cleanup.
    fn summarize_iteration(&mut self, start_depth: usize) -> SearchResult<()> {
        self.check_interrupt()?;
        debug!(
            iter = self.iter,
            start_depth,
            choice_depth = self.selector.choice_depth,
            "iteration summary"
        );
        if self.config.max_executions > 0
            && (self.iter - self.start_iter) >= self.config.max_executions
        {
            self.is_done_iterating = true;
        }
        let last_cd = self.selector.choice_depth.checked_sub(1);
        let reward = self.selector.coverage.update_iteration_coverage(last_cd);
        if self.config.learning_enabled() {
            self.selector.learning.reward(reward);
        }
        if self.config.task_orchestration != TaskOrchestrationMode::DepthFirst {
            self.set_backtrack_tasks();
            match self.set_next_backtrack_task()? {
                Some(task) => debug!(task, "next backtrack task"),
                None => self.is_done_iterating = true,
            }
        }
        self.print_progress(false);
        if !self.is_done_iterating {
            self.post_iteration_cleanup()?;
        }
        Ok(())
    }

    /// Walk the schedule backward to the deepest unexplored alternative and
    /// restore the scheduler there; exhausted depths are cleared.
    fn post_iteration_cleanup(&mut self) -> SearchResult<()> {
        self.selector.schedule.reset_filter();
        for d in (0..self.selector.schedule.size()).rev() {
            {
                let choice = self.selector.schedule.choice_mut(d);
                let repeat_universe = choice.repeat.universe();
                choice.update_handled_universe(&repeat_universe);
                choice.repeat = ChoiceVS::empty();
            }
            if !self.selector.schedule.choice(d).is_backtrack_non_empty() {
                self.selector.schedule.clear_choice(d);
                self.selector.coverage.reset_path_coverage(d);
                continue;
            }

            let choice = self.selector.schedule.choice(d).clone();
            let saved = if self.config.use_backtrack {
                choice.saved.clone()
            } else {
                None
            };
            let new_depth = saved.as_ref().map(|_| choice.scheduler_depth).unwrap_or(0);
            debug!(choice_depth = d, step_depth = new_depth, "backtracking");
            self.backtrack_depth = d;
            if new_depth == 0 {
                // replay from scratch: prefix choices become repeats
                self.runtime.reset_all();
                for i in 0..d {
                    let c = self.selector.schedule.choice_mut(i);
                    c.repeat = c.chosen.clone();
                }
                self.reset();
                self.initialize_search()?;
            } else {
                let saved = saved.unwrap_or_else(|| SavedState {
                    machine_states: Vec::new(),
                    counters: Default::default(),
                    symmetry: None,
                });
                self.runtime
                    .restore_states(&saved.machine_states, &saved.counters);
                self.selector.schedule.set_filter(choice.filter.clone());
                if let Some(symmetry) = &saved.symmetry {
                    self.runtime.symmetry.restore(symmetry);
                }
                self.depth = choice.scheduler_depth;
                self.selector.choice_depth = choice.scheduler_choice_depth;
                self.done = false;
            }
            return Ok(());
        }
        self.is_done_iterating = true;
        Ok(())
    }

    /// Freeze residual backtracks of the finished iteration into tasks.
    fn set_backtrack_tasks(&mut self) {
        let parent_coverage = self
            .selector
            .coverage
            .path_coverage_at_depth(self.selector.choice_depth.checked_sub(1));
        let parent = self.tasks.complete_parent(parent_coverage);

        let max_tasks = self.config.max_backtrack_tasks_per_execution;
        let mut num_added = 0usize;
        for cd in 0..self.selector.schedule.size() {
            if !self.selector.schedule.choice(cd).is_backtrack_non_empty() {
                continue;
            }
            // when the bound is about to be exceeded, one combined task
            // preserves the entire suffix so no backtracks are lost
            let exact = !(max_tasks > 0 && num_added == max_tasks - 1);
            self.create_backtrack_task_at(parent, cd, exact);
            num_added += 1;
            if !exact {
                break;
            }
        }
        if num_added > 0 {
            debug!(parent, tasks = num_added, "created backtrack tasks");
        }
    }

    fn create_backtrack_task_at(&mut self, parent: usize, cd: usize, exact: bool) {
        let original = self.selector.schedule.clone_choices();
        for i in 0..cd {
            self.selector.schedule.choice_mut(i).clear_backtrack();
        }
        if exact {
            for i in cd + 1..self.selector.schedule.size() {
                self.selector.schedule.clear_choice(i);
            }
        }
        let depth = self.selector.schedule.choice(cd).scheduler_depth;
        let frozen = self.selector.schedule.clone_choices();
        self.selector.schedule.set_choices(original);

        let prefix_coverage = self.selector.coverage.path_coverage_at_depth(Some(cd));
        let stats = self.selector.coverage.per_choice_depth_stats();
        self.tasks
            .create_task(parent, depth, cd, frozen, stats, prefix_coverage);
    }

    /// Swap the next pending task's frozen schedule in, if any.
    fn set_next_backtrack_task(&mut self) -> SearchResult<Option<usize>> {
        self.check_interrupt()?;
        let Some((id, choices, stats)) = self.tasks.next_task() else {
            return Ok(None);
        };
        self.selector.schedule.set_choices(choices);
        self.selector.coverage.set_per_choice_depth_stats(stats);
        Ok(Some(id))
    }

    fn check_liveness(&mut self, terminal: bool) -> SearchResult<()> {
        self.program
            .check_liveness(&self.runtime, terminal)
            .map_err(Into::into)
    }

    fn check_interrupt(&self) -> SearchResult<()> {
        match &self.stop_flag {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(SearchError::Interrupted),
            _ => Ok(()),
        }
    }

    /// Reset per-iteration scheduler counters (machines are reset by the
    /// caller through the runtime).
    fn reset(&mut self) {
        self.depth = 0;
        self.selector.choice_depth = 0;
        self.done = false;
        self.src_state.clear();
        // choices recorded during re-initialization must not inherit the
        // previous iteration's step snapshot
        self.selector.schedule.set_step_state(0, 0, None);
    }

    fn reset_stats(&mut self) {
        self.stats.reset_stats();
        self.cache.reset_counters();
        self.selector.coverage.reset_coverage();
        self.solver_stats = SolverStats::default();
    }

    fn store_src_state(&mut self) {
        if self.src_state.is_empty() {
            self.src_state = self.runtime.snapshot_states();
        }
    }

    fn is_done(&self) -> bool {
        self.done || self.is_done_iterating
    }

    /// Record the final verdict string.
    fn record_result(&mut self) {
        self.selector.schedule.recount_backtracks();
        let total = self.stats.total();
        let backtracks = self.total_num_backtracks();
        let mut result = String::new();
        if self.start_iter != 0 {
            result.push_str("(resumed run) ");
        }
        if total.completed {
            if backtracks == 0 {
                result.push_str("correct for any depth");
                self.selector.coverage.mark_complete();
            } else {
                result.push_str(&format!(
                    "partially correct with {} backtracks remaining",
                    backtracks
                ));
            }
        } else {
            let safe_depth = total.max_depth.min(self.config.max_step_bound);
            if backtracks == 0 {
                result.push_str(&format!("correct up to step {}", safe_depth));
            } else {
                result.push_str(&format!(
                    "partially correct up to step {} with {} backtracks remaining",
                    self.config.max_step_bound.saturating_sub(1),
                    backtracks
                ));
            }
        }
        self.result = result;
    }

    /// Remaining unexplored alternatives, in schedule and pending tasks.
    pub fn total_num_backtracks(&self) -> usize {
        self.selector.schedule.num_backtracks_in_schedule() + self.tasks.num_pending_backtracks()
    }

    pub fn total_data_backtracks_percent(&self) -> f64 {
        let total = self.total_num_backtracks();
        if total == 0 {
            return 0.0;
        }
        let data = self.selector.schedule.num_data_backtracks_in_schedule()
            + self.tasks.num_pending_data_backtracks();
        data as f64 * 100.0 / total as f64
    }

    /// Periodic progress line (at most one per five seconds unless forced).
    pub fn print_progress(&mut self, force: bool) {
        if !force && !self.monitor.should_report(5) {
            return;
        }
        let time_secs = format!("{:.1}", self.monitor.runtime_secs());
        let memory_mb = format!("{:.1}", current_memory_mb().unwrap_or(0.0));
        let data_pct = format!("{:.0}", self.total_data_backtracks_percent());
        let coverage = format!("{:.12}", self.selector.coverage.estimated_coverage());
        info!(
            time_secs = %time_secs,
            memory_mb = %memory_mb,
            depth = self.depth,
            iteration = self.iter - self.start_iter,
            remaining = self.total_num_backtracks(),
            data_pct = %data_pct,
            coverage = %coverage,
            goal = self.selector.coverage.coverage_goal_achieved(),
            distinct_states = self.cache.total_distinct_states,
            "progress"
        );
    }

    // --- checkpointing ---

    /// Snapshot the public engine state.
    pub fn snapshot(&self) -> Checkpoint {
        Checkpoint {
            config: self.config.clone(),
            program: self.program.name().to_string(),
            iter: self.iter,
            start_iter: self.start_iter,
            depth: self.depth,
            choice_depth: self.selector.choice_depth,
            backtrack_depth: self.backtrack_depth,
            done: self.done,
            result: self.result.clone(),
            schedule: self.selector.schedule.clone(),
            runtime: self.runtime.clone(),
            tasks: self.tasks.clone(),
            cache: self.cache.clone(),
            coverage: self.selector.coverage.clone(),
            learning: self.selector.learning.clone(),
            stats: self.stats.clone(),
            solver_stats: self.solver_stats.clone(),
            orchestrator: self.selector.orchestrator.clone(),
            vars: self.selector.vars.clone(),
        }
    }

    /// Rebuild a scheduler from a checkpoint, rebinding transient state and
    /// the program handle.
    pub fn from_checkpoint(checkpoint: Checkpoint, program: Arc<dyn Program>) -> Self {
        let mut selector = ChoiceSelector::new(&checkpoint.config);
        selector.schedule = checkpoint.schedule;
        selector.coverage = checkpoint.coverage;
        selector.learning = checkpoint.learning;
        selector.orchestrator = checkpoint.orchestrator;
        selector.vars = checkpoint.vars;
        selector.choice_depth = checkpoint.choice_depth;
        let mut cache = checkpoint.cache;
        cache.reinitialize();
        Self {
            monitor: TimeMonitor::new(checkpoint.config.timeout_secs),
            runtime: checkpoint.runtime,
            selector,
            tasks: checkpoint.tasks,
            cache,
            stats: checkpoint.stats,
            solver_stats: checkpoint.solver_stats,
            stop_flag: None,
            iter: checkpoint.iter,
            start_iter: checkpoint.start_iter,
            depth: checkpoint.depth,
            backtrack_depth: checkpoint.backtrack_depth,
            done: checkpoint.done,
            is_done_iterating: false,
            sticky_step: false,
            result: checkpoint.result,
            src_state: Vec::new(),
            program,
            config: checkpoint.config,
        }
    }

    pub fn read_from_file(path: &Path, program: Arc<dyn Program>) -> SearchResult<Self> {
        let checkpoint = read_checkpoint(path)?;
        Ok(Self::from_checkpoint(checkpoint, program))
    }

    /// Write the whole-engine checkpoint plus one file per backtrack point.
    /// Consumes pending tasks: intended for hand-off to other processes.
    pub fn write_to_file(&mut self) -> SearchResult<PathBuf> {
        let dir = self
            .config
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&dir).map_err(|source| SearchError::CheckpointIo {
            path: dir.clone(),
            source,
        })?;
        info!(
            backtracks = self.total_num_backtracks(),
            dir = %dir.display(),
            "writing current and backtrack states"
        );
        let current = dir.join(current_file_name());
        write_checkpoint(&current, &self.snapshot())?;
        self.write_backtracks_to_files(&dir, "backtrack")?;
        Ok(current)
    }

    pub fn write_backtracks_to_files(&mut self, dir: &Path, prefix: &str) -> SearchResult<()> {
        let writer = BacktrackWriter::new(dir);
        loop {
            for cd in 0..self.selector.schedule.size() {
                if self.selector.schedule.choice(cd).is_backtrack_non_empty() {
                    self.write_backtrack_to_file(dir, prefix, cd, &writer)?;
                }
            }
            if self.set_next_backtrack_task()?.is_none() {
                break;
            }
        }
        Ok(())
    }

    /// Serialize one backtrack point: the schedule is narrowed to that
    /// point, written, and restored.
    fn write_backtrack_to_file(
        &mut self,
        dir: &Path,
        prefix: &str,
        cd: usize,
        writer: &BacktrackWriter,
    ) -> SearchResult<()> {
        let original = self.selector.schedule.clone_choices();
        for i in 0..cd {
            self.selector.schedule.choice_mut(i).clear_backtrack();
        }
        for i in cd + 1..self.selector.schedule.size() {
            self.selector.schedule.clear_choice(i);
        }
        let depth = self.selector.schedule.choice(cd).scheduler_depth;
        let path = dir.join(backtrack_file_name(prefix, depth, cd, self.tasks.latest_task_id()));
        write_checkpoint(&path, &self.snapshot())?;
        writer.log(
            &path,
            self.selector.coverage.path_coverage_at_depth(Some(cd)),
            depth,
            cd,
        )?;
        self.selector.schedule.set_choices(original);
        Ok(())
    }

    // --- accessors ---

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SearchConfig {
        &mut self.config
    }

    pub fn result(&self) -> &str {
        &self.result
    }

    pub fn iter(&self) -> usize {
        self.iter
    }

    pub fn start_iter(&self) -> usize {
        self.start_iter
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn backtrack_depth(&self) -> usize {
        self.backtrack_depth
    }

    pub fn is_terminal(&self) -> bool {
        self.done
    }

    pub fn schedule(&self) -> &Schedule {
        &self.selector.schedule
    }

    pub fn task_manager(&self) -> &TaskManager {
        &self.tasks
    }

    pub fn state_cache(&self) -> &StateCache {
        &self.cache
    }

    pub fn coverage(&self) -> &CoverageStats {
        &self.selector.coverage
    }

    pub fn search_stats(&self) -> &SearchStats {
        &self.stats
    }

    pub fn solver_stats(&self) -> &SolverStats {
        &self.solver_stats
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }
}

/// Project the machine alternatives out of a sender choice.
fn sender_machines(choices: &ChoiceVS) -> PrimitiveVS<MachineId> {
    let mut out = PrimitiveVS::empty();
    for (value, guard) in choices.guarded_values() {
        if let ChoiceValue::Sender(id) = value {
            out = out.merge(PrimitiveVS::with_guard(*id, guard.clone()));
        }
    }
    out
}

//! Choice selection: the generic `get_next` routine behind every sender and
//! data choice.

use crate::config::SearchConfig;
use crate::coverage::CoverageStats;
use crate::orchestration::{ChoiceLearningStats, ChoiceOrchestrator};
use crate::schedule::{ChoiceVS, ChoiceValue, Schedule};
use actra_runtime::{DataSource, SymmetryTracker};
use actra_solver::{partition, PrimitiveVS, VarAllocator};
use tracing::trace;

/// Selects one choice per choice depth, splitting candidates into chosen
/// and backtrack and keeping the schedule, coverage, and learning state in
/// sync.
pub struct ChoiceSelector {
    pub schedule: Schedule,
    pub orchestrator: ChoiceOrchestrator,
    pub coverage: CoverageStats,
    pub learning: ChoiceLearningStats,
    pub vars: VarAllocator,
    /// Current choice depth; advances by one per selection.
    pub choice_depth: usize,
    /// Step depth of the step in progress, for coverage bookkeeping.
    pub step_depth: usize,
    symbolic: bool,
    use_backtrack: bool,
    learning_enabled: bool,
}

impl ChoiceSelector {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            schedule: Schedule::new(),
            orchestrator: ChoiceOrchestrator::new(
                config.choice_orchestration,
                config.seed,
                config.epsilon,
            ),
            coverage: CoverageStats::new(),
            learning: ChoiceLearningStats::default(),
            vars: VarAllocator::new(),
            choice_depth: 0,
            step_depth: 0,
            symbolic: config.symbolic,
            use_backtrack: config.use_backtrack,
            learning_enabled: config.learning_enabled(),
        }
    }

    /// Pick the next choice at the current choice depth.
    ///
    /// Replays a pending repeat if one exists, otherwise consumes the
    /// backtrack set at this depth, otherwise generates fresh candidates
    /// with `produce`. Advances the choice depth by exactly one.
    pub fn get_next(
        &mut self,
        is_data: bool,
        symmetry: Option<&SymmetryTracker>,
        produce: impl FnOnce() -> Vec<ChoiceVS>,
    ) -> ChoiceVS {
        let depth = self.choice_depth;

        let mut choices = Vec::new();
        let mut is_new_choice = false;
        if depth < self.schedule.size() {
            if let Some(repeat) = self.schedule.repeat_at(depth) {
                self.schedule.restrict_filter_for_depth(depth);
                self.choice_depth += 1;
                return repeat;
            }
            choices = self.schedule.take_backtrack(depth);
        }

        if choices.is_empty() {
            trace!(choice_depth = depth, "new choice");
            choices = produce();
            if let Some(tracker) = symmetry {
                choices = reduce_senders(tracker, choices);
            }
            let filter = self.schedule.filter.clone();
            choices = choices
                .into_iter()
                .map(|c| c.restrict(&filter))
                .filter(|c| !c.is_empty_vs())
                .collect();
            is_new_choice = true;
        }

        if choices.len() > 1 {
            self.orchestrator
                .reorder(&mut choices, is_data, &self.learning);
        }

        let mut chosen: Vec<ChoiceVS> = Vec::new();
        let mut backtrack: Vec<ChoiceVS> = Vec::new();
        for (i, choice) in choices.into_iter().enumerate() {
            if self.symbolic || i == 0 {
                chosen.push(choice);
            } else {
                backtrack.push(choice);
            }
        }

        self.coverage.update_depth_coverage(
            self.step_depth,
            depth,
            chosen.len(),
            backtrack.len(),
            is_data,
            is_new_choice,
        );

        let chosen_vs = self.generate_next(chosen);
        if self.learning_enabled && !chosen_vs.is_empty_vs() {
            self.learning.record(&chosen_vs);
        }

        self.schedule
            .record_choice(depth, chosen_vs.clone(), backtrack, is_data, self.use_backtrack);
        self.schedule.restrict_filter_for_depth(depth);
        self.choice_depth += 1;
        chosen_vs
    }

    /// Fold the chosen candidates into one summary. Explicit mode has at
    /// most one; symbolic mode partitions the list under the filter with
    /// fresh one-hot variables so the step explores the disjunction at once.
    fn generate_next(&mut self, chosen: Vec<ChoiceVS>) -> ChoiceVS {
        let filter = self.schedule.filter.clone();
        match chosen.len() {
            0 => ChoiceVS::empty(),
            1 => chosen.into_iter().next().map(|c| c.restrict(&filter)).unwrap_or_default(),
            _ => partition(chosen, &filter, &mut self.vars),
        }
    }
}

/// Symmetry reduction over sender candidates: only summaries whose machines
/// are class representatives survive. Data choices pass `None` and skip this.
fn reduce_senders(tracker: &SymmetryTracker, choices: Vec<ChoiceVS>) -> Vec<ChoiceVS> {
    let as_machines: Vec<PrimitiveVS<actra_runtime::MachineId>> = choices
        .iter()
        .map(|c| {
            c.map(|v| match v {
                ChoiceValue::Sender(id) => *id,
                // non-sender values never reach symmetry reduction
                _ => actra_runtime::MachineId(usize::MAX),
            })
        })
        .collect();
    let kept = tracker.reduce_choices(as_machines);
    choices
        .into_iter()
        .filter(|c| {
            let machines = c.map(|v| match v {
                ChoiceValue::Sender(id) => *id,
                _ => actra_runtime::MachineId(usize::MAX),
            });
            kept.iter().any(|k| *k == machines)
        })
        .collect()
}

impl DataSource for ChoiceSelector {
    fn choose_bool(&mut self) -> PrimitiveVS<bool> {
        let vs = self.get_next(true, None, || {
            vec![
                ChoiceVS::new(ChoiceValue::Bool(true)),
                ChoiceVS::new(ChoiceValue::Bool(false)),
            ]
        });
        extract(&vs, |v| match v {
            ChoiceValue::Bool(b) => Some(*b),
            _ => None,
        })
    }

    fn choose_int(&mut self, bound: i64) -> PrimitiveVS<i64> {
        let vs = self.get_next(true, None, || {
            (0..bound.max(1))
                .map(|n| ChoiceVS::new(ChoiceValue::Int(n)))
                .collect()
        });
        extract(&vs, |v| match v {
            ChoiceValue::Int(n) => Some(*n),
            _ => None,
        })
    }
}

fn extract<T: Clone + Eq>(
    vs: &ChoiceVS,
    f: impl Fn(&ChoiceValue) -> Option<T>,
) -> PrimitiveVS<T> {
    let mut out = PrimitiveVS::empty();
    for (value, guard) in vs.guarded_values() {
        if let Some(v) = f(value) {
            out = out.merge(PrimitiveVS::with_guard(v, guard.clone()));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use actra_runtime::MachineId;

    fn selector(symbolic: bool) -> ChoiceSelector {
        let config = SearchConfig {
            symbolic,
            ..Default::default()
        };
        ChoiceSelector::new(&config)
    }

    fn sender(n: usize) -> ChoiceVS {
        ChoiceVS::new(ChoiceValue::Sender(MachineId(n)))
    }

    #[test]
    fn explicit_mode_splits_head_from_backtrack() {
        let mut s = selector(false);
        let vs = s.get_next(false, None, || vec![sender(0), sender(1), sender(2)]);
        assert_eq!(vs, sender(0));
        assert_eq!(s.choice_depth, 1);
        assert_eq!(s.schedule.size(), 1);
        let choice = s.schedule.choice(0);
        assert_eq!(choice.backtrack.len(), 2);
        // partitioned alternatives: chosen and backtracks never overlap
        for b in &choice.backtrack {
            assert!(choice.chosen.universe().and(&b.universe()).is_false());
        }
    }

    #[test]
    fn symbolic_mode_takes_all_candidates_at_once() {
        let mut s = selector(true);
        let vs = s.get_next(true, None, || {
            vec![
                ChoiceVS::new(ChoiceValue::Bool(true)),
                ChoiceVS::new(ChoiceValue::Bool(false)),
            ]
        });
        assert_eq!(vs.len(), 2);
        assert!(s.schedule.choice(0).backtrack.is_empty());
        let entries = vs.guarded_values();
        assert!(entries[0].1.and(&entries[1].1).is_false());
        assert!(vs.universe().is_true());
    }

    #[test]
    fn backtrack_consumed_before_fresh_candidates() {
        let mut s = selector(false);
        s.get_next(false, None, || vec![sender(0), sender(1)]);

        // next iteration resumes at depth 0: the backtrack is consumed and
        // the producer must not run
        s.choice_depth = 0;
        let vs = s.get_next(false, None, || panic!("producer must not be called"));
        assert_eq!(vs, sender(1));
        assert!(!s.schedule.choice(0).is_backtrack_non_empty());
    }

    #[test]
    fn repeat_replays_under_filter() {
        let mut s = selector(false);
        s.get_next(false, None, || vec![sender(3)]);
        s.schedule.choice_mut(0).repeat = sender(3);

        s.choice_depth = 0;
        let vs = s.get_next(false, None, || panic!("producer must not be called"));
        assert_eq!(vs, sender(3));
        assert_eq!(s.choice_depth, 1);
    }

    #[test]
    fn empty_candidates_yield_empty_summary() {
        let mut s = selector(false);
        let vs = s.get_next(false, None, Vec::new);
        assert!(vs.is_empty_vs());
        assert_eq!(s.schedule.size(), 1);
    }

    #[test]
    fn choose_bool_records_data_choice() {
        let mut s = selector(false);
        let vs = s.choose_bool();
        assert_eq!(vs, PrimitiveVS::new(true));
        let choice = s.schedule.choice(0);
        assert!(choice.is_data);
        assert_eq!(choice.backtrack.len(), 1);
    }
}

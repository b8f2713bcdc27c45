//! The schedule: one Choice per choice depth, plus the path filter.

use actra_runtime::{SrcState, SymmetrySnapshot};
use actra_solver::{Guard, PrimitiveVS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value a schedule choice can take.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChoiceValue {
    /// Scheduling choice: which machine sends next.
    Sender(actra_runtime::MachineId),
    /// Data choice: a boolean program input.
    Bool(bool),
    /// Data choice: an integer program input.
    Int(i64),
}

pub type ChoiceVS = PrimitiveVS<ChoiceValue>;

/// Scheduler state snapshot captured at the start of a step, attached to
/// choices whose backtrack set is non-empty so the engine can resume there.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SavedState {
    pub machine_states: SrcState,
    pub counters: BTreeMap<String, u64>,
    pub symmetry: Option<SymmetrySnapshot>,
}

/// One depth of the schedule.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Choice {
    /// The alternative actually explored at this depth.
    pub chosen: ChoiceVS,
    /// A choice re-played under its restricted guard while resuming.
    pub repeat: ChoiceVS,
    /// Remaining alternatives, each with its own guard.
    pub backtrack: Vec<ChoiceVS>,
    /// Union of guards of alternatives explored so far; only grows.
    pub handled_universe: Guard,
    /// Restorable scheduler state; present iff `backtrack` is non-empty.
    pub saved: Option<SavedState>,
    /// Step depth at the point of save.
    pub scheduler_depth: usize,
    /// Choice depth at the point of save.
    pub scheduler_choice_depth: usize,
    /// Schedule filter at the point of save.
    pub filter: Guard,
    /// Data choice (program input) rather than a scheduling choice.
    pub is_data: bool,
}

impl Default for Choice {
    fn default() -> Self {
        Self {
            chosen: ChoiceVS::empty(),
            repeat: ChoiceVS::empty(),
            backtrack: Vec::new(),
            handled_universe: Guard::never(),
            saved: None,
            scheduler_depth: 0,
            scheduler_choice_depth: 0,
            filter: Guard::always(),
            is_data: false,
        }
    }
}

impl Choice {
    pub fn is_backtrack_non_empty(&self) -> bool {
        !self.backtrack.is_empty()
    }

    pub fn num_backtracks(&self) -> usize {
        self.backtrack.len()
    }

    /// Fold a universe into the handled set (monotonic).
    pub fn update_handled_universe(&mut self, universe: &Guard) {
        self.handled_universe = self.handled_universe.or(universe);
    }

    /// Drop the backtrack set; the saved state goes with it.
    pub fn clear_backtrack(&mut self) {
        self.backtrack.clear();
        self.saved = None;
    }

    /// Clear everything recorded at this depth.
    pub fn clear(&mut self) {
        *self = Choice::default();
    }

    /// The universe of whatever this depth currently pins the filter to.
    fn current_universe(&self) -> Guard {
        if !self.repeat.is_empty_vs() {
            self.repeat.universe()
        } else {
            self.chosen.universe()
        }
    }
}

/// Ordered sequence of choices plus the path filter restricting every
/// subsequent restriction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Schedule {
    choices: Vec<Choice>,
    pub filter: Guard,
    /// Step depth / choice depth / state captured at the start of the
    /// current step; attached to choices recorded during the step.
    pending_depth: usize,
    pending_choice_depth: usize,
    pending_state: Option<SavedState>,
    num_backtracks: usize,
    num_data_backtracks: usize,
}

impl Default for Schedule {
    fn default() -> Self {
        Self::new()
    }
}

impl Schedule {
    pub fn new() -> Self {
        Self {
            choices: Vec::new(),
            filter: Guard::always(),
            pending_depth: 0,
            pending_choice_depth: 0,
            pending_state: None,
            num_backtracks: 0,
            num_data_backtracks: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.choices.len()
    }

    pub fn choice(&self, depth: usize) -> &Choice {
        &self.choices[depth]
    }

    pub fn choice_mut(&mut self, depth: usize) -> &mut Choice {
        &mut self.choices[depth]
    }

    fn ensure_depth(&mut self, depth: usize) {
        if self.choices.len() <= depth {
            self.choices.resize_with(depth + 1, Choice::default);
        }
    }

    /// Record the scheduler state captured at the start of a step.
    pub fn set_step_state(
        &mut self,
        depth: usize,
        choice_depth: usize,
        state: Option<SavedState>,
    ) {
        self.pending_depth = depth;
        self.pending_choice_depth = choice_depth;
        self.pending_state = state;
    }

    /// Non-empty repeat at `depth` restricted to the filter, if any.
    pub fn repeat_at(&self, depth: usize) -> Option<ChoiceVS> {
        let repeat = self.choices.get(depth)?.repeat.restrict(&self.filter);
        if repeat.is_empty_vs() {
            None
        } else {
            Some(repeat)
        }
    }

    /// Consume the backtrack set at `depth`; its saved state goes with it.
    pub fn take_backtrack(&mut self, depth: usize) -> Vec<ChoiceVS> {
        match self.choices.get_mut(depth) {
            Some(choice) => {
                let taken = std::mem::take(&mut choice.backtrack);
                choice.saved = None;
                taken
            }
            None => Vec::new(),
        }
    }

    /// Record the outcome of a choice selection at `depth`.
    pub fn record_choice(
        &mut self,
        depth: usize,
        chosen: ChoiceVS,
        backtrack: Vec<ChoiceVS>,
        is_data: bool,
        use_backtrack: bool,
    ) {
        self.ensure_depth(depth);
        let filter = self.filter.clone();
        let pending_state = self.pending_state.clone();
        let pending_depth = self.pending_depth;
        let pending_choice_depth = self.pending_choice_depth;
        let choice = &mut self.choices[depth];
        choice.update_handled_universe(&chosen.universe());
        choice.chosen = chosen;
        choice.is_data = is_data;
        choice.scheduler_depth = pending_depth;
        choice.scheduler_choice_depth = pending_choice_depth;
        choice.filter = filter;
        if backtrack.is_empty() {
            choice.clear_backtrack();
        } else {
            choice.backtrack = backtrack;
            choice.saved = if use_backtrack { pending_state } else { None };
        }
    }

    /// Restrict the filter to whatever was decided at `depth`.
    pub fn restrict_filter_for_depth(&mut self, depth: usize) {
        if let Some(choice) = self.choices.get(depth) {
            self.filter = self.filter.and(&choice.current_universe());
        }
    }

    pub fn reset_filter(&mut self) {
        self.filter = Guard::always();
    }

    pub fn set_filter(&mut self, filter: Guard) {
        self.filter = filter;
    }

    pub fn clear_repeat(&mut self, depth: usize) {
        if let Some(choice) = self.choices.get_mut(depth) {
            choice.repeat = ChoiceVS::empty();
        }
    }

    pub fn clear_choice(&mut self, depth: usize) {
        if let Some(choice) = self.choices.get_mut(depth) {
            choice.clear();
        }
    }

    /// Recount the schedule's backtrack totals.
    pub fn recount_backtracks(&mut self) {
        self.num_backtracks = 0;
        self.num_data_backtracks = 0;
        for choice in &self.choices {
            self.num_backtracks += choice.num_backtracks();
            if choice.is_data {
                self.num_data_backtracks += choice.num_backtracks();
            }
        }
    }

    pub fn num_backtracks_in_schedule(&self) -> usize {
        self.num_backtracks
    }

    pub fn num_data_backtracks_in_schedule(&self) -> usize {
        self.num_data_backtracks
    }

    pub fn clone_choices(&self) -> Vec<Choice> {
        self.choices.clone()
    }

    pub fn set_choices(&mut self, choices: Vec<Choice>) {
        self.choices = choices;
    }

    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actra_runtime::MachineId;

    fn sender(n: usize) -> ChoiceVS {
        ChoiceVS::new(ChoiceValue::Sender(MachineId(n)))
    }

    #[test]
    fn record_grows_schedule_by_one() {
        let mut s = Schedule::new();
        assert_eq!(s.size(), 0);
        s.record_choice(0, sender(0), vec![], false, true);
        assert_eq!(s.size(), 1);
        assert_eq!(s.choice(0).chosen, sender(0));
    }

    #[test]
    fn saved_present_iff_backtrack_non_empty() {
        let mut s = Schedule::new();
        s.set_step_state(
            0,
            0,
            Some(SavedState {
                machine_states: vec![],
                counters: BTreeMap::new(),
                symmetry: None,
            }),
        );
        s.record_choice(0, sender(0), vec![sender(1)], false, true);
        assert!(s.choice(0).saved.is_some());
        assert!(s.choice(0).is_backtrack_non_empty());

        let taken = s.take_backtrack(0);
        assert_eq!(taken.len(), 1);
        assert!(s.choice(0).saved.is_none());
        assert!(!s.choice(0).is_backtrack_non_empty());
    }

    #[test]
    fn no_saved_state_when_backtracking_disabled() {
        let mut s = Schedule::new();
        s.set_step_state(
            0,
            0,
            Some(SavedState {
                machine_states: vec![],
                counters: BTreeMap::new(),
                symmetry: None,
            }),
        );
        s.record_choice(0, sender(0), vec![sender(1)], false, false);
        assert!(s.choice(0).saved.is_none());
    }

    #[test]
    fn handled_universe_grows_monotonically() {
        let mut s = Schedule::new();
        let g = actra_solver::Guard::var(0);
        let chosen = ChoiceVS::with_guard(ChoiceValue::Bool(true), g.clone());
        s.record_choice(0, chosen, vec![], true, true);
        let first = s.choice(0).handled_universe.clone();
        assert_eq!(first, g);

        let chosen2 = ChoiceVS::with_guard(ChoiceValue::Bool(false), g.not());
        s.record_choice(0, chosen2, vec![], true, true);
        assert!(s.choice(0).handled_universe.is_true());
    }

    #[test]
    fn restrict_filter_pins_to_chosen_universe() {
        let mut s = Schedule::new();
        let g = actra_solver::Guard::var(1);
        s.record_choice(
            0,
            ChoiceVS::with_guard(ChoiceValue::Bool(true), g.clone()),
            vec![],
            true,
            true,
        );
        s.restrict_filter_for_depth(0);
        assert_eq!(s.filter, g);
    }

    #[test]
    fn backtrack_counts_split_by_kind() {
        let mut s = Schedule::new();
        s.record_choice(0, sender(0), vec![sender(1), sender(2)], false, true);
        s.record_choice(
            1,
            ChoiceVS::new(ChoiceValue::Bool(true)),
            vec![ChoiceVS::new(ChoiceValue::Bool(false))],
            true,
            true,
        );
        s.recount_backtracks();
        assert_eq!(s.num_backtracks_in_schedule(), 3);
        assert_eq!(s.num_data_backtracks_in_schedule(), 1);
    }
}

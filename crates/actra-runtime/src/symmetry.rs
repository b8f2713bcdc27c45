//! Symmetry classes over same-interface machines.
//!
//! Machines in one class are indistinguishable for scheduling purposes:
//! only one representative per class is offered as a candidate sender.
//! A machine leaves its class the first time it is actually chosen.

use crate::machine::MachineId;
use actra_solver::PrimitiveVS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SymmetryTracker {
    enabled: bool,
    /// Per-interface equivalence classes, each an ordered id list.
    classes: BTreeMap<String, Vec<Vec<MachineId>>>,
}

/// Saved tracker state, captured alongside the scheduler snapshot.
pub type SymmetrySnapshot = SymmetryTracker;

impl SymmetryTracker {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            classes: BTreeMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Register a freshly created machine. New machines start in their own
    /// class; `merge_all_classes` folds same-interface classes together.
    pub fn register(&mut self, id: MachineId, interface: &str) {
        if !self.enabled {
            return;
        }
        let classes = self.classes.entry(interface.to_string()).or_default();
        if !classes.iter().any(|c| c.contains(&id)) {
            classes.push(vec![id]);
        }
    }

    /// Merge every class of each interface into one (full symmetry mode,
    /// applied before sender selection).
    pub fn merge_all_classes(&mut self) {
        if !self.enabled {
            return;
        }
        for classes in self.classes.values_mut() {
            if classes.len() > 1 {
                let mut merged: Vec<MachineId> = classes.drain(..).flatten().collect();
                merged.sort_unstable();
                merged.dedup();
                classes.push(merged);
            }
        }
    }

    /// Drop candidates for machines that are non-representative members of
    /// a class (only the first member of each class may be scheduled).
    pub fn reduce_choices(
        &self,
        choices: Vec<PrimitiveVS<MachineId>>,
    ) -> Vec<PrimitiveVS<MachineId>> {
        if !self.enabled {
            return choices;
        }
        choices
            .into_iter()
            .filter(|c| {
                c.guarded_values()
                    .iter()
                    .all(|(id, _)| self.is_representative(*id))
            })
            .collect()
    }

    /// The chosen machines become distinguished: split each out of any
    /// multi-member class into its own.
    pub fn update_after_choice(&mut self, chosen: &PrimitiveVS<MachineId>) {
        if !self.enabled {
            return;
        }
        for (id, _) in chosen.guarded_values() {
            self.distinguish(*id);
        }
    }

    pub fn snapshot(&self) -> SymmetrySnapshot {
        self.clone()
    }

    pub fn restore(&mut self, snapshot: &SymmetrySnapshot) {
        *self = snapshot.clone();
    }

    pub fn reset(&mut self) {
        self.classes.clear();
    }

    fn is_representative(&self, id: MachineId) -> bool {
        for classes in self.classes.values() {
            for class in classes {
                if let Some(pos) = class.iter().position(|m| *m == id) {
                    return pos == 0;
                }
            }
        }
        // unclassified machines are always schedulable
        true
    }

    fn distinguish(&mut self, id: MachineId) {
        for classes in self.classes.values_mut() {
            let mut split = None;
            for (ci, class) in classes.iter_mut().enumerate() {
                if class.len() > 1 {
                    if let Some(pos) = class.iter().position(|m| *m == id) {
                        class.remove(pos);
                        split = Some(ci);
                        break;
                    }
                }
            }
            if split.is_some() {
                classes.push(vec![id]);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actra_solver::Guard;

    fn candidate(n: usize) -> PrimitiveVS<MachineId> {
        PrimitiveVS::with_guard(MachineId(n), Guard::always())
    }

    #[test]
    fn merged_class_keeps_one_representative() {
        let mut t = SymmetryTracker::new(true);
        t.register(MachineId(1), "Node");
        t.register(MachineId(2), "Node");
        t.register(MachineId(3), "Node");
        t.merge_all_classes();

        let reduced = t.reduce_choices(vec![candidate(1), candidate(2), candidate(3)]);
        assert_eq!(reduced.len(), 1);
        assert_eq!(reduced[0].guarded_values()[0].0, MachineId(1));
    }

    #[test]
    fn chosen_machine_is_distinguished() {
        let mut t = SymmetryTracker::new(true);
        t.register(MachineId(1), "Node");
        t.register(MachineId(2), "Node");
        t.merge_all_classes();
        t.update_after_choice(&candidate(2));

        // both 1 (class representative) and 2 (own class) now schedulable
        let reduced = t.reduce_choices(vec![candidate(1), candidate(2)]);
        assert_eq!(reduced.len(), 2);
    }

    #[test]
    fn disabled_tracker_is_transparent() {
        let mut t = SymmetryTracker::new(false);
        t.register(MachineId(1), "Node");
        t.merge_all_classes();
        let reduced = t.reduce_choices(vec![candidate(1), candidate(2)]);
        assert_eq!(reduced.len(), 2);
    }
}

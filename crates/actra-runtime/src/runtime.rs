//! The runtime owns every machine; the scheduler drives it by id.

use crate::machine::{Machine, MachineId, MachineSnapshot};
use crate::message::Message;
use crate::symmetry::SymmetryTracker;
use actra_solver::{Guard, PrimitiveVS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

/// Machine states captured at the start of a step, in current-machine order.
pub type SrcState = Vec<(MachineId, MachineSnapshot)>;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Runtime {
    machines: Vec<Machine>,
    /// Machines live in the current iteration, in creation order.
    current: Vec<MachineId>,
    /// Per-interface creation counters.
    counters: BTreeMap<String, u64>,
    pub symmetry: SymmetryTracker,
}

impl Runtime {
    pub fn new(symmetry_enabled: bool) -> Self {
        Self {
            machines: Vec::new(),
            current: Vec::new(),
            counters: BTreeMap::new(),
            symmetry: SymmetryTracker::new(symmetry_enabled),
        }
    }

    /// Allocate (or revive) the next machine of `interface`.
    ///
    /// Machines are cached by (interface, ordinal): when an iteration is
    /// replayed after a full reset, the same creation sequence yields the
    /// same machine ids, which is what lets recorded schedule choices
    /// replay against stable identities.
    pub fn setup_machine(&mut self, interface: &str) -> MachineId {
        let ordinal = {
            let counter = self.counters.entry(interface.to_string()).or_insert(0);
            let ordinal = *counter;
            *counter += 1;
            ordinal
        };
        let id = match self
            .machines
            .iter()
            .find(|m| m.interface == interface && m.ordinal == ordinal)
        {
            Some(m) => m.id,
            None => {
                let id = MachineId(self.machines.len());
                self.machines.push(Machine::new(id, interface.to_string(), ordinal));
                id
            }
        };
        self.machine_mut(id).reset();
        if !self.current.contains(&id) {
            self.current.push(id);
        }
        self.symmetry.register(id, interface);
        trace!(machine = %id, interface, ordinal, "machine set up");
        id
    }

    pub fn machine(&self, id: MachineId) -> &Machine {
        &self.machines[id.0]
    }

    pub fn machine_mut(&mut self, id: MachineId) -> &mut Machine {
        &mut self.machines[id.0]
    }

    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    /// Live machines of the current iteration, in creation order.
    pub fn current_machines(&self) -> &[MachineId] {
        &self.current
    }

    pub fn counters(&self) -> &BTreeMap<String, u64> {
        &self.counters
    }

    /// Candidate senders: one summary per live machine that can run,
    /// guarded by the paths on which it can.
    pub fn sender_candidates(&self) -> Vec<PrimitiveVS<MachineId>> {
        let mut candidates = Vec::new();
        for &id in &self.current {
            let guard = self.machine(id).can_run_guard();
            if !guard.is_false() {
                candidates.push(PrimitiveVS::with_guard(id, guard));
            }
        }
        candidates
    }

    /// Remove one message from `id`'s buffer restricted to `guard`.
    pub fn rm_buffer(&mut self, id: MachineId, guard: &Guard) -> Option<Message> {
        self.machine_mut(id).rm_buffer(guard)
    }

    /// Drop buffered messages whose target has halted: remove the
    /// halted-target part of each message and repeat until no remnant.
    pub fn gc_halted_targets(&mut self) {
        let halted: Vec<Guard> = self.machines.iter().map(|m| m.halted.clone()).collect();
        for &id in &self.current.clone() {
            loop {
                let machine = self.machine(id);
                if machine.send_buffer.is_empty() {
                    break;
                }
                let target_halted = machine
                    .send_buffer
                    .iter()
                    .fold(Guard::never(), |acc, m| {
                        acc.or(&m.target_halted_guard(|t| halted[t.0].clone()))
                    });
                if target_halted.is_false() {
                    break;
                }
                trace!(machine = %id, "dropping messages to halted target");
                self.machine_mut(id)
                    .send_buffer
                    .retain_mut(|m| {
                        let kept = m.restrict(&target_halted.not());
                        let keep = !kept.is_empty();
                        *m = kept;
                        keep
                    });
            }
        }
    }

    /// Capture the state of every live machine (start-of-step snapshot).
    pub fn snapshot_states(&self) -> SrcState {
        self.current
            .iter()
            .map(|&id| (id, self.machine(id).snapshot()))
            .collect()
    }

    /// Restore live machines from a snapshot; machines absent from it are
    /// reset.
    pub fn restore_states(&mut self, states: &SrcState, counters: &BTreeMap<String, u64>) {
        self.current = states.iter().map(|(id, _)| *id).collect();
        for (id, snapshot) in states {
            self.machine_mut(*id).restore(snapshot);
        }
        let live: Vec<MachineId> = states.iter().map(|(id, _)| *id).collect();
        for i in 0..self.machines.len() {
            let id = MachineId(i);
            if !live.contains(&id) {
                self.machine_mut(id).reset();
            }
        }
        self.counters = counters.clone();
    }

    /// Reset for a from-scratch replay: machines are kept (cached by
    /// interface and ordinal) but all mutable state is cleared.
    pub fn reset_all(&mut self) {
        for m in &mut self.machines {
            m.reset();
        }
        self.current.clear();
        self.counters.clear();
        self.symmetry.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::value::Value;

    fn send(rt: &mut Runtime, from: MachineId, to: MachineId, name: &str) {
        let msg = Message::new(
            Event::user(name),
            PrimitiveVS::new(to),
            None,
            &Guard::always(),
        );
        rt.machine_mut(from).push_message(msg);
    }

    #[test]
    fn setup_reuses_machines_by_ordinal() {
        let mut rt = Runtime::new(false);
        let a = rt.setup_machine("A");
        let b = rt.setup_machine("B");
        rt.machine_mut(a).local_state = vec![PrimitiveVS::new(Value::Int(1))];

        rt.reset_all();
        let a2 = rt.setup_machine("A");
        let b2 = rt.setup_machine("B");
        assert_eq!(a, a2);
        assert_eq!(b, b2);
        assert!(rt.machine(a2).local_state.is_empty());
    }

    #[test]
    fn sender_candidates_honor_lifecycle() {
        let mut rt = Runtime::new(false);
        let a = rt.setup_machine("A");
        let b = rt.setup_machine("B");
        rt.machine_mut(a).started = Guard::always();
        rt.machine_mut(b).started = Guard::always();
        send(&mut rt, a, b, "ev");

        let candidates = rt.sender_candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].guarded_values()[0].0, a);
    }

    #[test]
    fn gc_drops_messages_to_fully_halted_target() {
        let mut rt = Runtime::new(false);
        let a = rt.setup_machine("A");
        let b = rt.setup_machine("B");
        rt.machine_mut(a).started = Guard::always();
        send(&mut rt, a, b, "ev");
        rt.machine_mut(b).halted = Guard::always();

        rt.gc_halted_targets();
        assert!(rt.machine(a).send_buffer.is_empty());
        assert!(rt.sender_candidates().is_empty());
    }

    #[test]
    fn gc_keeps_live_part_of_split_message() {
        let mut rt = Runtime::new(false);
        let a = rt.setup_machine("A");
        let b = rt.setup_machine("B");
        rt.machine_mut(a).started = Guard::always();
        send(&mut rt, a, b, "ev");
        let g = Guard::var(0);
        rt.machine_mut(b).halted = g.clone();

        rt.gc_halted_targets();
        let buffer = &rt.machine(a).send_buffer;
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer[0].universe(), g.not());
    }

    #[test]
    fn restore_states_resets_absent_machines() {
        let mut rt = Runtime::new(false);
        let a = rt.setup_machine("A");
        rt.machine_mut(a).started = Guard::always();
        let snapshot = rt.snapshot_states();
        let counters = rt.counters().clone();

        let b = rt.setup_machine("B");
        rt.machine_mut(b).started = Guard::always();

        rt.restore_states(&snapshot, &counters);
        assert_eq!(rt.current_machines(), &[a]);
        assert!(rt.machine(b).started.is_false());
        assert_eq!(rt.counters().get("B"), None);
    }
}

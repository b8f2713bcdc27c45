//! Machine state: local variables, send buffer, lifecycle guards.

use crate::message::Message;
use crate::value::Value;
use actra_solver::{Guard, PrimitiveVS};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable machine identity. Ids are assigned by the runtime and survive
/// iteration resets, so schedule choices recorded against them replay
/// correctly across backtracks.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct MachineId(pub usize);

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M{}", self.0)
    }
}

/// A machine owned by the runtime.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Machine {
    pub id: MachineId,
    /// Interface (machine type) name this machine instantiates.
    pub interface: String,
    /// Per-interface creation ordinal; (interface, ordinal) is stable across
    /// iteration resets and is how the runtime reuses machine slots.
    pub ordinal: u64,
    /// Local variables, each a guarded value summary.
    pub local_state: Vec<PrimitiveVS<Value>>,
    /// Outgoing messages in FIFO order.
    pub send_buffer: Vec<Message>,
    /// Paths on which the machine has been started.
    pub started: Guard,
    /// Paths on which the machine has halted.
    pub halted: Guard,
}

/// Everything needed to roll one machine back to the start of a step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MachineSnapshot {
    pub local_state: Vec<PrimitiveVS<Value>>,
    pub send_buffer: Vec<Message>,
    pub started: Guard,
    pub halted: Guard,
}

impl Machine {
    pub fn new(id: MachineId, interface: String, ordinal: u64) -> Self {
        Self {
            id,
            interface,
            ordinal,
            local_state: Vec::new(),
            send_buffer: Vec::new(),
            started: Guard::never(),
            halted: Guard::never(),
        }
    }

    /// Clear all mutable state, returning the machine to its pre-start shape.
    pub fn reset(&mut self) {
        self.local_state.clear();
        self.send_buffer.clear();
        self.started = Guard::never();
        self.halted = Guard::never();
    }

    pub fn get_local_state(&self) -> Vec<PrimitiveVS<Value>> {
        self.local_state.clone()
    }

    pub fn set_local_state(&mut self, state: Vec<PrimitiveVS<Value>>) {
        self.local_state = state;
    }

    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            local_state: self.local_state.clone(),
            send_buffer: self.send_buffer.clone(),
            started: self.started.clone(),
            halted: self.halted.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: &MachineSnapshot) {
        self.local_state = snapshot.local_state.clone();
        self.send_buffer = snapshot.send_buffer.clone();
        self.started = snapshot.started.clone();
        self.halted = snapshot.halted.clone();
    }

    /// Paths on which this machine can be scheduled as the next sender:
    /// started, not halted, and holding a pending message.
    pub fn can_run_guard(&self) -> Guard {
        match self.send_buffer.first() {
            Some(head) => head
                .universe()
                .and(&self.started)
                .and(&self.halted.not()),
            None => Guard::never(),
        }
    }

    /// Remove the part of the earliest intersecting buffered message that
    /// lives under `guard`. Returns `None` when nothing intersects.
    pub fn rm_buffer(&mut self, guard: &Guard) -> Option<Message> {
        let idx = self
            .send_buffer
            .iter()
            .position(|m| !m.universe().and(guard).is_false())?;
        let removed = self.send_buffer[idx].restrict(guard);
        let rest = self.send_buffer[idx].restrict(&guard.not());
        if rest.is_empty() {
            self.send_buffer.remove(idx);
        } else {
            self.send_buffer[idx] = rest;
        }
        Some(removed)
    }

    pub fn push_message(&mut self, message: Message) {
        if !message.is_empty() {
            self.send_buffer.push(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;

    fn msg(name: &str, target: usize, guard: &Guard) -> Message {
        Message::new(
            Event::user(name),
            PrimitiveVS::new(MachineId(target)),
            None,
            guard,
        )
    }

    #[test]
    fn rm_buffer_splits_under_guard() {
        let mut m = Machine::new(MachineId(0), "A".into(), 0);
        let g = Guard::var(0);
        m.push_message(msg("ev", 1, &Guard::always()));

        let removed = m.rm_buffer(&g).unwrap();
        assert_eq!(removed.universe(), g);
        // the complement remains queued
        assert_eq!(m.send_buffer.len(), 1);
        assert_eq!(m.send_buffer[0].universe(), g.not());

        let rest = m.rm_buffer(&Guard::always()).unwrap();
        assert_eq!(rest.universe(), g.not());
        assert!(m.send_buffer.is_empty());
    }

    #[test]
    fn rm_buffer_skips_disjoint_messages() {
        let mut m = Machine::new(MachineId(0), "A".into(), 0);
        let g = Guard::var(1);
        m.push_message(msg("first", 1, &g));
        m.push_message(msg("second", 1, &g.not()));

        let removed = m.rm_buffer(&g.not()).unwrap();
        assert_eq!(removed.universe(), g.not());
        assert_eq!(m.send_buffer.len(), 1);
        assert_eq!(m.send_buffer[0].universe(), g);
    }

    #[test]
    fn can_run_requires_start_and_pending_message() {
        let mut m = Machine::new(MachineId(0), "A".into(), 0);
        assert!(m.can_run_guard().is_false());
        m.push_message(msg("ev", 1, &Guard::always()));
        assert!(m.can_run_guard().is_false());
        m.started = Guard::always();
        assert!(m.can_run_guard().is_true());
        m.halted = Guard::always();
        assert!(m.can_run_guard().is_false());
    }

    #[test]
    fn snapshot_round_trip() {
        let mut m = Machine::new(MachineId(2), "B".into(), 1);
        m.started = Guard::always();
        m.local_state = vec![PrimitiveVS::new(Value::Int(5))];
        m.push_message(msg("ev", 0, &Guard::always()));
        let snap = m.snapshot();

        m.local_state[0] = PrimitiveVS::new(Value::Int(9));
        m.send_buffer.clear();
        m.restore(&snap);
        assert_eq!(m.local_state[0], PrimitiveVS::new(Value::Int(5)));
        assert_eq!(m.send_buffer.len(), 1);
    }
}

//! Messages: guarded (event, target, payload) triples in send buffers.

use crate::event::Event;
use crate::machine::MachineId;
use crate::value::Value;
use actra_solver::{Guard, PrimitiveVS};
use serde::{Deserialize, Serialize};

/// A message in flight. Every component is a value summary, so one message
/// can carry different events to different targets under disjoint guards,
/// the shape produced by merging the per-sender removals of a step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub event: PrimitiveVS<Event>,
    pub target: PrimitiveVS<MachineId>,
    pub payload: Option<PrimitiveVS<Value>>,
}

impl Message {
    pub fn new(
        event: Event,
        target: PrimitiveVS<MachineId>,
        payload: Option<PrimitiveVS<Value>>,
        guard: &Guard,
    ) -> Self {
        Self {
            event: PrimitiveVS::with_guard(event, guard.clone()),
            target: target.restrict(guard),
            payload: payload.map(|p| p.restrict(guard)),
        }
    }

    /// Paths on which this message exists at all.
    pub fn universe(&self) -> Guard {
        self.event.universe()
    }

    pub fn is_empty(&self) -> bool {
        self.event.is_empty_vs()
    }

    pub fn restrict(&self, guard: &Guard) -> Self {
        Self {
            event: self.event.restrict(guard),
            target: self.target.restrict(guard),
            payload: self.payload.as_ref().map(|p| p.restrict(guard)),
        }
    }

    /// Merge other messages into this one (the first removal becomes the
    /// base; the rest are folded in under their own guards).
    pub fn merge(mut self, others: Vec<Message>) -> Self {
        for other in others {
            self.event = self.event.merge(other.event);
            self.target = self.target.merge(other.target);
            self.payload = match (self.payload.take(), other.payload) {
                (Some(a), Some(b)) => Some(a.merge(b)),
                (Some(a), None) => Some(a),
                (None, b) => b,
            };
        }
        self
    }

    /// Paths on which this message is a machine-creation.
    pub fn create_guard(&self) -> Guard {
        self.event
            .guarded_values()
            .iter()
            .filter(|(e, _)| e.is_create())
            .fold(Guard::never(), |acc, (_, g)| acc.or(g))
    }

    /// Paths on which this message carries a synchronous event.
    pub fn sync_guard(&self) -> Guard {
        self.event
            .guarded_values()
            .iter()
            .filter(|(e, _)| e.is_sync())
            .fold(Guard::never(), |acc, (_, g)| acc.or(g))
    }

    /// Paths on which the message's target is halted, given each machine's
    /// halted guard.
    pub fn target_halted_guard(&self, halted_of: impl Fn(MachineId) -> Guard) -> Guard {
        self.target
            .guarded_values()
            .iter()
            .fold(Guard::never(), |acc, (m, g)| acc.or(&g.and(&halted_of(*m))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mid(n: usize) -> MachineId {
        MachineId(n)
    }

    #[test]
    fn merge_folds_events_and_targets() {
        let g = Guard::var(0);
        let a = Message::new(Event::user("ping"), PrimitiveVS::new(mid(1)), None, &g);
        let b = Message::new(
            Event::user("pong"),
            PrimitiveVS::new(mid(2)),
            None,
            &g.not(),
        );
        let m = a.merge(vec![b]);
        assert_eq!(m.event.len(), 2);
        assert_eq!(m.target.len(), 2);
        assert!(m.universe().is_true());
    }

    #[test]
    fn create_guard_selects_creation_paths() {
        let g = Guard::var(1);
        let create = Message::new(Event::create(), PrimitiveVS::new(mid(3)), None, &g);
        assert_eq!(create.create_guard(), g);
        assert!(create.sync_guard().is_false());
    }

    #[test]
    fn target_halted_guard_intersects_halt() {
        let m = Message::new(Event::user("ev"), PrimitiveVS::new(mid(1)), None, &Guard::always());
        let halted = Guard::var(2);
        let g = m.target_halted_guard(|_| halted.clone());
        assert_eq!(g, halted);
    }
}

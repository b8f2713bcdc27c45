//! Program-under-test interface: event handlers over guarded state.

use crate::event::Event;
use crate::machine::MachineId;
use crate::message::Message;
use crate::runtime::Runtime;
use crate::value::Value;
use actra_solver::{Guard, PrimitiveVS};
use thiserror::Error;

/// Errors raised by the program under test.
#[derive(Debug, Error)]
pub enum ProgramError {
    /// An assertion failed; `guard` is the path condition on which it did.
    #[error("assertion failed: {message}")]
    AssertionFailed { message: String, guard: Guard },

    #[error("liveness violated: {message}")]
    LivenessViolated { message: String },
}

pub type ProgramResult = Result<(), ProgramError>;

/// Source of data nondeterminism. Implemented by the engine's choice
/// selector; handlers never see how the choice is scheduled or backtracked.
pub trait DataSource {
    /// Choose a boolean program input.
    fn choose_bool(&mut self) -> PrimitiveVS<bool>;

    /// Choose an integer program input in `0..bound`.
    fn choose_int(&mut self, bound: i64) -> PrimitiveVS<i64>;
}

/// Handler context: everything an event handler may do to the world,
/// restricted to the guard under which the handler runs.
pub struct EffectCtx<'a> {
    pub runtime: &'a mut Runtime,
    pub data: &'a mut dyn DataSource,
    /// The machine this handler runs on.
    pub self_id: MachineId,
    /// Paths on which this handler invocation is live.
    pub guard: Guard,
}

impl<'a> EffectCtx<'a> {
    /// Read local variable `idx`, restricted to the handler's guard.
    pub fn var(&self, idx: usize) -> PrimitiveVS<Value> {
        self.runtime
            .machine(self.self_id)
            .local_state
            .get(idx)
            .map(|vs| vs.restrict(&self.guard))
            .unwrap_or_default()
    }

    /// Write local variable `idx` under the handler's guard: paths outside
    /// the guard keep their old value.
    pub fn update_var(&mut self, idx: usize, value: PrimitiveVS<Value>) {
        let guard = self.guard.clone();
        let machine = self.runtime.machine_mut(self.self_id);
        if machine.local_state.len() <= idx {
            machine.local_state.resize(idx + 1, PrimitiveVS::empty());
        }
        let old = machine.local_state[idx].restrict(&guard.not());
        machine.local_state[idx] = old.merge(value.restrict(&guard));
    }

    /// Enqueue a message from this machine.
    pub fn send(
        &mut self,
        target: &PrimitiveVS<MachineId>,
        event: Event,
        payload: Option<PrimitiveVS<Value>>,
    ) {
        let msg = Message::new(event, target.clone(), payload, &self.guard);
        self.runtime.machine_mut(self.self_id).push_message(msg);
    }

    /// Send to this machine itself.
    pub fn send_self(&mut self, event: Event, payload: Option<PrimitiveVS<Value>>) {
        let target = PrimitiveVS::new(self.self_id);
        self.send(&target, event, payload);
    }

    /// Create a machine of `interface`. The creation is itself a message:
    /// the new machine only starts when the scheduler dispatches it.
    pub fn create(&mut self, interface: &str) -> PrimitiveVS<MachineId> {
        let id = self.runtime.setup_machine(interface);
        let target = PrimitiveVS::new(id);
        let msg = Message::new(Event::create(), target.clone(), None, &self.guard);
        self.runtime.machine_mut(self.self_id).push_message(msg);
        target.restrict(&self.guard)
    }

    /// Halt this machine on the handler's paths.
    pub fn halt(&mut self) {
        let guard = self.guard.clone();
        let machine = self.runtime.machine_mut(self.self_id);
        machine.halted = machine.halted.or(&guard);
    }

    /// Assert that `cond` holds on every live path.
    ///
    /// The violation is reported at the precise path condition on which
    /// `cond` is false; paths where it holds are not implicated. A
    /// guard-split condition (one coming out of `choose_bool`) therefore
    /// surfaces only its violating sub-guard.
    pub fn ensure(&self, cond: &PrimitiveVS<bool>, message: &str) -> ProgramResult {
        let violated = cond.guard_for(&false).and(&self.guard);
        if violated.is_false() {
            Ok(())
        } else {
            Err(ProgramError::AssertionFailed {
                message: message.to_string(),
                guard: violated,
            })
        }
    }

    pub fn choose_bool(&mut self) -> PrimitiveVS<bool> {
        self.data.choose_bool()
    }

    pub fn choose_int(&mut self, bound: i64) -> PrimitiveVS<i64> {
        self.data.choose_int(bound)
    }
}

/// The program under test: a set of machine interfaces with handlers.
///
/// Handlers express state updates through `EffectCtx`; all nondeterminism
/// flows through the context's choose methods so the engine can schedule
/// and backtrack it.
pub trait Program {
    /// Name used to rebind the program when resuming from a checkpoint.
    fn name(&self) -> &str;

    /// Interface of the machine created by search initialization.
    fn main_interface(&self) -> &str;

    /// Run when a machine starts (main machine at initialization, created
    /// machines when their creation message is dispatched).
    fn on_start(&self, ctx: &mut EffectCtx) -> ProgramResult;

    /// Handle a non-creation event.
    fn on_event(
        &self,
        ctx: &mut EffectCtx,
        event: &Event,
        payload: Option<&PrimitiveVS<Value>>,
    ) -> ProgramResult;

    /// Liveness hook, called after each iteration (`terminal` on the final
    /// check). Default: nothing to check.
    fn check_liveness(&self, _runtime: &Runtime, _terminal: bool) -> ProgramResult {
        Ok(())
    }
}

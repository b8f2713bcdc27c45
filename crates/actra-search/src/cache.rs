//! State caching: distinct-state detection and revisit pruning.
//!
//! Canonicalizes the per-step global state to a 64-bit key and tracks which
//! keys have been seen. The emitted `distinct_state_guard` identifies the
//! path conditions under which the current step reaches a not-yet-seen
//! state; restricting sender candidates to it prunes revisit paths.

use crate::config::StateCachingMode;
use actra_runtime::{MachineId, SrcState, Value};
use actra_solver::{concretize, Guard, GuardedValue, PrimitiveVS, SolverStats};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use tracing::trace;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateCache {
    mode: StateCachingMode,
    distinct: HashSet<u64>,
    pub total_states: u64,
    pub total_distinct_states: u64,
    /// Paths reaching a new state this step. Transient: rebuilt every step,
    /// reset on reinitialize.
    #[serde(skip, default = "Guard::always")]
    distinct_state_guard: Guard,
}

impl StateCache {
    pub fn new(mode: StateCachingMode) -> Self {
        Self {
            mode,
            distinct: HashSet::new(),
            total_states: 0,
            total_distinct_states: 0,
            distinct_state_guard: Guard::always(),
        }
    }

    pub fn mode(&self) -> StateCachingMode {
        self.mode
    }

    pub fn distinct_state_guard(&self) -> &Guard {
        &self.distinct_state_guard
    }

    /// Reset transient state after deserialization.
    pub fn reinitialize(&mut self) {
        self.distinct_state_guard = Guard::always();
    }

    pub fn reset_counters(&mut self) {
        self.distinct.clear();
        self.total_states = 0;
        self.total_distinct_states = 0;
        self.distinct_state_guard = Guard::always();
    }

    /// Explicit-mode enumeration: one concrete state per step.
    ///
    /// Sticky steps and steps at or below the backtrack depth are not
    /// cached: they re-visit states the current iteration already counted.
    pub fn enumerate_explicit(
        &mut self,
        src_state: &SrcState,
        sticky_step: bool,
        choice_depth: usize,
        backtrack_depth: usize,
        solver_stats: &mut SolverStats,
    ) -> (u64, u64) {
        if sticky_step || choice_depth <= backtrack_depth || self.mode == StateCachingMode::None {
            self.distinct_state_guard = Guard::always();
            return (0, 0);
        }

        let key = match self.mode {
            StateCachingMode::Fast => fast_state_key(src_state),
            _ => exact_state_key(src_state, solver_stats),
        };

        self.total_states += 1;
        if self.distinct.contains(&key) {
            trace!(key, "repeated state");
            self.distinct_state_guard = Guard::never();
            (1, 0)
        } else {
            trace!(key, "new state");
            self.distinct.insert(key);
            self.total_distinct_states += 1;
            self.distinct_state_guard = Guard::always();
            (1, 1)
        }
    }

    /// Symbolic-mode enumeration: concretize under a shrinking path
    /// condition until it is exhausted, collecting the guard of every
    /// assignment that reaches a new state.
    pub fn enumerate_symbolic(
        &mut self,
        src_state: &SrcState,
        sticky_step: bool,
        choice_depth: usize,
        backtrack_depth: usize,
        solver_stats: &mut SolverStats,
    ) -> (u64, u64) {
        self.distinct_state_guard = Guard::never();
        if sticky_step || choice_depth <= backtrack_depth {
            self.distinct_state_guard = Guard::always();
            return (0, 0);
        }

        let mut iter_pc = Guard::always();
        let mut already_seen = Guard::never();
        let mut num_states = 0u64;
        let mut num_distinct = 0u64;

        while !iter_pc.is_false() {
            let mut concrete_state_guard = Guard::always();
            let mut global_state: Vec<Vec<Option<Value>>> = Vec::new();
            for (i, (_, snapshot)) in src_state.iter().enumerate() {
                let mut machine_state: Vec<Option<Value>> = Vec::new();
                for (j, vs) in snapshot.local_state.iter().enumerate() {
                    solver_stats.concretizations += 1;
                    match concretize(&vs.restrict(&iter_pc)) {
                        Some(GuardedValue { value, guard }) => {
                            iter_pc = iter_pc.and(&guard);
                            concrete_state_guard = concrete_state_guard.and(&guard);
                            machine_state.push(Some(value));
                        }
                        None => {
                            if i == 0 && j == 0 {
                                // the path condition no longer concretizes
                                // the very first variable: nothing further
                                // can be enumerated under it
                                return (num_states, num_distinct);
                            }
                            machine_state.push(None);
                        }
                    }
                }
                if !machine_state.is_empty() {
                    global_state.push(machine_state);
                }
            }

            if !global_state.is_empty() {
                self.total_states += 1;
                num_states += 1;
                let key = hash_concrete(&global_state);
                if self.distinct.insert(key) {
                    self.total_distinct_states += 1;
                    num_distinct += 1;
                    if self.mode != StateCachingMode::None {
                        self.distinct_state_guard =
                            self.distinct_state_guard.or(&concrete_state_guard);
                    }
                    trace!(key, "new state");
                } else {
                    trace!(key, "repeated state");
                }
            }

            already_seen = already_seen.or(&iter_pc);
            iter_pc = already_seen.not();
        }
        (num_states, num_distinct)
    }

    /// Restrict each candidate sender to the distinct-state guard, dropping
    /// candidates that become empty.
    pub fn filter_distinct(
        &self,
        candidates: Vec<PrimitiveVS<MachineId>>,
    ) -> Vec<PrimitiveVS<MachineId>> {
        if self.distinct_state_guard.is_true() {
            return candidates;
        }
        candidates
            .into_iter()
            .map(|c| c.restrict(&self.distinct_state_guard))
            .filter(|c| !c.is_empty_vs())
            .collect()
    }
}

/// Fast mode: hash each variable's summary directly, no concretization.
fn fast_state_key(src_state: &SrcState) -> u64 {
    let mut acc = 0u64;
    for (id, snapshot) in src_state {
        for (j, vs) in snapshot.local_state.iter().enumerate() {
            acc ^= mix(id.0 as u64, j as u64, vs.concrete_hash());
        }
        for (j, msg) in snapshot.send_buffer.iter().enumerate() {
            let mut hasher = ahash::AHasher::default();
            msg.event.concrete_hash().hash(&mut hasher);
            msg.target.concrete_hash().hash(&mut hasher);
            acc ^= mix(id.0 as u64, 0x1000 + j as u64, hasher.finish());
        }
    }
    acc
}

/// Exact mode: concretize each variable and hash the concrete global state.
fn exact_state_key(src_state: &SrcState, solver_stats: &mut SolverStats) -> u64 {
    let mut global_state: Vec<Vec<Option<Value>>> = Vec::new();
    for (_, snapshot) in src_state {
        let machine_state = snapshot
            .local_state
            .iter()
            .map(|vs| {
                solver_stats.concretizations += 1;
                concretize(vs).map(|gv| gv.value)
            })
            .collect();
        global_state.push(machine_state);
    }
    hash_concrete(&global_state)
}

fn hash_concrete(state: &[Vec<Option<Value>>]) -> u64 {
    let mut hasher = ahash::AHasher::default();
    state.hash(&mut hasher);
    hasher.finish()
}

/// splitmix-style per-variable mixing (decomposable across variables).
fn mix(a: u64, b: u64, c: u64) -> u64 {
    let h = (a ^ 0x2d35_8dcc_aa6c_78a5).wrapping_mul(0x9e37_79b9_7f4a_7c15);
    let h = (h ^ b).wrapping_mul(0x517c_c1b7_2722_0a95);
    let h = h ^ (h >> 32) ^ c;
    h.wrapping_mul(0x2545_f491_4f6c_dd1d)
}

/// Hash of the live machines' states, used as the learning state key.
pub fn program_state_hash(src_state: &SrcState) -> u64 {
    fast_state_key(src_state)
}

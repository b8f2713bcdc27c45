//! Concretization: extracting one concrete alternative from a summary.

use crate::vs::{GuardedValue, PrimitiveVS};

/// Pull one guarded concrete value out of a summary, or `None` when the
/// summary is empty. Entry order is deterministic, so repeated runs
/// concretize identically.
pub fn concretize<T: Clone>(vs: &PrimitiveVS<T>) -> Option<GuardedValue<T>>
where
    T: Eq,
{
    vs.guarded_values()
        .first()
        .map(|(v, g)| GuardedValue::new(v.clone(), g.clone()))
}

/// Counters for solver-facade activity, reported with the search statistics.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct SolverStats {
    /// Concretization calls made by the state cache.
    pub concretizations: u64,
    /// Fresh-variable partitions built for symbolic choices.
    pub partitions: u64,
    /// Largest guard (in decision nodes) observed so far.
    pub peak_guard_nodes: usize,
}

impl SolverStats {
    pub fn note_guard(&mut self, nodes: usize) {
        if nodes > self.peak_guard_nodes {
            self.peak_guard_nodes = nodes;
        }
    }
}

//! Guarded value summaries.
//!
//! A value summary is a disjunction of concrete values, each live under its
//! own path condition. Entry guards are pairwise disjoint and never false,
//! and values are distinct, so a summary denotes a partial function from
//! paths to values.

use crate::guard::{Guard, VarAllocator};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// One alternative of a value summary: `value` holds on the paths in `guard`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardedValue<T> {
    pub value: T,
    pub guard: Guard,
}

impl<T> GuardedValue<T> {
    pub fn new(value: T, guard: Guard) -> Self {
        Self { value, guard }
    }
}

/// A guarded disjunction of concrete values of type `T`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimitiveVS<T> {
    entries: Vec<(T, Guard)>,
}

impl<T> Default for PrimitiveVS<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Clone + Eq> PrimitiveVS<T> {
    /// The empty summary (no value on any path).
    pub fn empty() -> Self {
        Self::default()
    }

    /// A summary holding `value` on every path.
    pub fn new(value: T) -> Self {
        Self {
            entries: vec![(value, Guard::always())],
        }
    }

    /// A summary holding `value` exactly on the paths in `guard`.
    pub fn with_guard(value: T, guard: Guard) -> Self {
        if guard.is_false() {
            Self::empty()
        } else {
            Self {
                entries: vec![(value, guard)],
            }
        }
    }

    pub fn guarded_values(&self) -> &[(T, Guard)] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = GuardedValue<&T>> {
        self.entries
            .iter()
            .map(|(v, g)| GuardedValue::new(v, g.clone()))
    }

    #[inline]
    pub fn is_empty_vs(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct values in the summary.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Union of all entry guards: the paths on which the summary has a value.
    pub fn universe(&self) -> Guard {
        self.entries
            .iter()
            .fold(Guard::never(), |acc, (_, g)| acc.or(g))
    }

    /// Paths on which the summary holds exactly `value`.
    pub fn guard_for(&self, value: &T) -> Guard {
        self.entries
            .iter()
            .find(|(v, _)| v == value)
            .map(|(_, g)| g.clone())
            .unwrap_or_else(Guard::never)
    }

    /// Restrict every entry to `guard`, dropping entries that become empty.
    pub fn restrict(&self, guard: &Guard) -> Self {
        if guard.is_true() {
            return self.clone();
        }
        let entries = self
            .entries
            .iter()
            .filter_map(|(v, g)| {
                let g = g.and(guard);
                if g.is_false() {
                    None
                } else {
                    Some((v.clone(), g))
                }
            })
            .collect();
        Self { entries }
    }

    /// Merge another summary into this one, or-ing guards of equal values.
    ///
    /// Caller is responsible for the inputs being disjoint where it matters;
    /// merging overlapping summaries widens guards rather than erroring.
    pub fn merge(mut self, other: Self) -> Self {
        for (v, g) in other.entries {
            match self.entries.iter_mut().find(|(sv, _)| *sv == v) {
                Some((_, sg)) => *sg = sg.or(&g),
                None => self.entries.push((v, g)),
            }
        }
        self
    }

    pub fn merge_all(summaries: impl IntoIterator<Item = Self>) -> Self {
        summaries
            .into_iter()
            .fold(Self::empty(), |acc, vs| acc.merge(vs))
    }

    /// Apply `f` to every value, merging entries that collide.
    pub fn map<U: Clone + Eq>(&self, f: impl Fn(&T) -> U) -> PrimitiveVS<U> {
        let mut out = PrimitiveVS::empty();
        for (v, g) in &self.entries {
            out = out.merge(PrimitiveVS::with_guard(f(v), g.clone()));
        }
        out
    }

    /// Keep only entries whose value satisfies `f`.
    pub fn filter(&self, f: impl Fn(&T) -> bool) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(v, _)| f(v))
                .cloned()
                .collect(),
        }
    }
}

impl<T: Hash> PrimitiveVS<T> {
    /// Order-independent hash of the summary's (value, guard) entries.
    ///
    /// XOR-combined so the hash does not depend on entry order, mirroring
    /// the decomposable state fingerprints used by the state cache.
    pub fn concrete_hash(&self) -> u64 {
        let mut acc = 0u64;
        for (v, g) in &self.entries {
            let mut hasher = ahash::AHasher::default();
            v.hash(&mut hasher);
            g.hash(&mut hasher);
            acc ^= hasher.finish();
        }
        acc
    }
}

impl PrimitiveVS<bool> {
    /// Paths on which the summary holds `true`.
    pub fn guard_for_true(&self) -> Guard {
        self.guard_for(&true)
    }
}

/// Build one summary from `candidates` under `filter`, giving each candidate
/// a fresh disjoint sub-guard (one-hot over fresh choice variables).
///
/// The last candidate receives the remainder of the filter, so the result's
/// universe equals `filter` restricted to the candidates' own universes.
pub fn partition<T: Clone + Eq>(
    candidates: Vec<PrimitiveVS<T>>,
    filter: &Guard,
    vars: &mut VarAllocator,
) -> PrimitiveVS<T> {
    let mut remaining = filter.clone();
    let last = candidates.len().saturating_sub(1);
    let mut out = PrimitiveVS::empty();
    for (i, candidate) in candidates.into_iter().enumerate() {
        let slot = if i == last {
            remaining.clone()
        } else {
            let v = Guard::var(vars.fresh());
            let slot = remaining.and(&v);
            remaining = remaining.and(&v.not());
            slot
        };
        out = out.merge(candidate.restrict(&slot));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singleton_universe() {
        let vs = PrimitiveVS::new(7);
        assert!(vs.universe().is_true());
        assert_eq!(vs.len(), 1);
        assert!(!vs.is_empty_vs());
    }

    #[test]
    fn restrict_drops_empty_entries() {
        let g = Guard::var(0);
        let vs = PrimitiveVS::new(1).merge(PrimitiveVS::with_guard(2, g.clone()));
        // 1 lives everywhere, 2 only under v0; restricting to !v0 kills 2
        let r = vs.restrict(&g.not());
        assert_eq!(r.len(), 1);
        assert_eq!(r.guarded_values()[0].0, 1);
    }

    #[test]
    fn merge_unions_guards_of_equal_values() {
        let a = PrimitiveVS::with_guard('x', Guard::var(0));
        let b = PrimitiveVS::with_guard('x', Guard::var(0).not());
        let m = a.merge(b);
        assert_eq!(m.len(), 1);
        assert!(m.universe().is_true());
    }

    #[test]
    fn guard_for_missing_value_is_never() {
        let vs = PrimitiveVS::new(true);
        assert!(vs.guard_for(&false).is_false());
        assert!(vs.guard_for_true().is_true());
    }

    #[test]
    fn partition_yields_disjoint_guards() {
        let mut vars = VarAllocator::new();
        let candidates = vec![
            PrimitiveVS::new(10),
            PrimitiveVS::new(20),
            PrimitiveVS::new(30),
        ];
        let vs = partition(candidates, &Guard::always(), &mut vars);
        assert_eq!(vs.len(), 3);
        let entries = vs.guarded_values();
        for (i, (_, gi)) in entries.iter().enumerate() {
            assert!(!gi.is_false());
            for (_, gj) in &entries[i + 1..] {
                assert!(gi.and(gj).is_false());
            }
        }
        assert!(vs.universe().is_true());
    }

    #[test]
    fn partition_under_restricted_filter() {
        let mut vars = VarAllocator::new();
        let filter = Guard::var(9);
        let vs = partition(
            vec![PrimitiveVS::new(1), PrimitiveVS::new(2)],
            &filter,
            &mut vars,
        );
        assert_eq!(vs.universe(), filter);
    }

    #[test]
    fn concrete_hash_is_order_independent() {
        let a = PrimitiveVS::with_guard(1, Guard::var(0))
            .merge(PrimitiveVS::with_guard(2, Guard::var(0).not()));
        let b = PrimitiveVS::with_guard(2, Guard::var(0).not())
            .merge(PrimitiveVS::with_guard(1, Guard::var(0)));
        assert_eq!(a.concrete_hash(), b.concrete_hash());
    }
}

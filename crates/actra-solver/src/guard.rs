//! Path-condition guards over symbolic choice variables.
//!
//! A guard is a boolean formula restricting under which paths a value or
//! branch is live. Guards are kept as reduced ordered binary decision
//! diagrams, so structural equality coincides with semantic equality and
//! `is_false`/`is_true` are O(1) checks on the root.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A boolean path condition over symbolic choice variables.
///
/// Guard::clone() is an atomic increment; the underlying decision diagram
/// is immutable and shared.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Guard(Node);

#[derive(Clone, Serialize, Deserialize)]
enum Node {
    False,
    True,
    Branch(Arc<Branch>),
}

/// Internal decision node: test `var`, take `hi` when true, `lo` otherwise.
/// Variable indices strictly increase from root to leaf.
#[derive(Serialize, Deserialize)]
struct Branch {
    var: u32,
    lo: Node,
    hi: Node,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Node::False, Node::False) | (Node::True, Node::True) => true,
            (Node::Branch(a), Node::Branch(b)) => {
                Arc::ptr_eq(a, b) || (a.var == b.var && a.lo == b.lo && a.hi == b.hi)
            }
            _ => false,
        }
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Node::False => state.write_u8(0),
            Node::True => state.write_u8(1),
            Node::Branch(b) => {
                state.write_u8(2);
                b.var.hash(state);
                b.lo.hash(state);
                b.hi.hash(state);
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Op {
    And,
    Or,
}

/// Memo table keyed on node identity; terminals map to small sentinels that
/// can never collide with heap pointers.
type Memo = HashMap<(usize, usize), Node>;

fn node_key(n: &Node) -> usize {
    match n {
        Node::False => 0,
        Node::True => 1,
        Node::Branch(b) => Arc::as_ptr(b) as usize,
    }
}

fn branch_var(n: &Node) -> Option<u32> {
    match n {
        Node::Branch(b) => Some(b.var),
        _ => None,
    }
}

/// Cofactors of `n` with respect to `var`. A node whose root tests a later
/// variable is independent of `var` and cofactors to itself.
fn cofactor(n: &Node, var: u32) -> (Node, Node) {
    match n {
        Node::Branch(b) if b.var == var => (b.lo.clone(), b.hi.clone()),
        _ => (n.clone(), n.clone()),
    }
}

/// Build a decision node, applying the ROBDD reduction rule.
fn mk_branch(var: u32, lo: Node, hi: Node) -> Node {
    if lo == hi {
        lo
    } else {
        Node::Branch(Arc::new(Branch { var, lo, hi }))
    }
}

fn apply(op: Op, a: &Node, b: &Node, memo: &mut Memo) -> Node {
    match (op, a, b) {
        (Op::And, Node::False, _) | (Op::And, _, Node::False) => return Node::False,
        (Op::And, Node::True, x) | (Op::And, x, Node::True) => return x.clone(),
        (Op::Or, Node::True, _) | (Op::Or, _, Node::True) => return Node::True,
        (Op::Or, Node::False, x) | (Op::Or, x, Node::False) => return x.clone(),
        _ => {}
    }
    let key = (node_key(a), node_key(b));
    if let Some(hit) = memo.get(&key) {
        return hit.clone();
    }
    let var = match (branch_var(a), branch_var(b)) {
        (Some(va), Some(vb)) => va.min(vb),
        (Some(va), None) => va,
        (None, Some(vb)) => vb,
        // Both terminal: fully covered by the shortcut arms above.
        (None, None) => return a.clone(),
    };
    let (alo, ahi) = cofactor(a, var);
    let (blo, bhi) = cofactor(b, var);
    let lo = apply(op, &alo, &blo, memo);
    let hi = apply(op, &ahi, &bhi, memo);
    let out = mk_branch(var, lo, hi);
    memo.insert(key, out.clone());
    out
}

fn negate(n: &Node, memo: &mut HashMap<usize, Node>) -> Node {
    match n {
        Node::False => Node::True,
        Node::True => Node::False,
        Node::Branch(b) => {
            let key = Arc::as_ptr(b) as usize;
            if let Some(hit) = memo.get(&key) {
                return hit.clone();
            }
            let lo = negate(&b.lo, memo);
            let hi = negate(&b.hi, memo);
            let out = mk_branch(b.var, lo, hi);
            memo.insert(key, out.clone());
            out
        }
    }
}

impl Guard {
    /// The guard that holds on every path.
    pub fn always() -> Self {
        Guard(Node::True)
    }

    /// The guard that holds on no path.
    pub fn never() -> Self {
        Guard(Node::False)
    }

    /// The guard of a single symbolic choice variable.
    pub fn var(var: u32) -> Self {
        Guard(mk_branch(var, Node::False, Node::True))
    }

    #[inline]
    pub fn is_true(&self) -> bool {
        matches!(self.0, Node::True)
    }

    #[inline]
    pub fn is_false(&self) -> bool {
        matches!(self.0, Node::False)
    }

    pub fn and(&self, other: &Guard) -> Guard {
        Guard(apply(Op::And, &self.0, &other.0, &mut Memo::new()))
    }

    pub fn or(&self, other: &Guard) -> Guard {
        Guard(apply(Op::Or, &self.0, &other.0, &mut Memo::new()))
    }

    pub fn not(&self) -> Guard {
        Guard(negate(&self.0, &mut HashMap::new()))
    }

    pub fn and_not(&self, other: &Guard) -> Guard {
        self.and(&other.not())
    }

    pub fn implies(&self, other: &Guard) -> Guard {
        self.not().or(other)
    }

    /// Evaluate under a concrete assignment of choice variables.
    pub fn eval(&self, assignment: impl Fn(u32) -> bool) -> bool {
        let mut node = &self.0;
        loop {
            match node {
                Node::False => return false,
                Node::True => return true,
                Node::Branch(b) => {
                    node = if assignment(b.var) { &b.hi } else { &b.lo };
                }
            }
        }
    }

    /// Number of decision nodes (terminals excluded). Diagnostic only.
    pub fn size(&self) -> usize {
        fn count(n: &Node, seen: &mut Vec<usize>) -> usize {
            match n {
                Node::Branch(b) => {
                    let ptr = Arc::as_ptr(b) as usize;
                    if seen.contains(&ptr) {
                        0
                    } else {
                        seen.push(ptr);
                        1 + count(&b.lo, seen) + count(&b.hi, seen)
                    }
                }
                _ => 0,
            }
        }
        count(&self.0, &mut Vec::new())
    }
}

impl Default for Guard {
    fn default() -> Self {
        Guard::never()
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Node::True => write!(f, "Guard(true)"),
            Node::False => write!(f, "Guard(false)"),
            Node::Branch(b) => write!(f, "Guard(v{}.., {} nodes)", b.var, self.size()),
        }
    }
}

/// Monotonic source of fresh symbolic choice variables.
///
/// One allocator per scheduler; serialized with it so a resumed run keeps
/// allocating above every variable mentioned by the restored schedule.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VarAllocator {
    next: u32,
}

impl VarAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> u32 {
        let v = self.next;
        self.next += 1;
        v
    }

    pub fn allocated(&self) -> u32 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn constants() {
        assert!(Guard::always().is_true());
        assert!(Guard::never().is_false());
        assert!(!Guard::var(0).is_true());
        assert!(!Guard::var(0).is_false());
    }

    #[test]
    fn contradiction_is_false() {
        let v = Guard::var(3);
        assert!(v.and(&v.not()).is_false());
        assert!(v.or(&v.not()).is_true());
    }

    #[test]
    fn canonical_equality() {
        let a = Guard::var(0).and(&Guard::var(1));
        let b = Guard::var(1).and(&Guard::var(0));
        assert_eq!(a, b);

        let c = Guard::var(0).or(&Guard::var(1)).not();
        let d = Guard::var(0).not().and(&Guard::var(1).not());
        assert_eq!(c, d);
    }

    #[test]
    fn and_not_subtracts() {
        let v0 = Guard::var(0);
        let v1 = Guard::var(1);
        let both = v0.or(&v1);
        let only_v1 = both.and_not(&v0);
        assert!(only_v1.eval(|v| v == 1));
        assert!(!only_v1.eval(|v| v == 0));
    }

    #[test]
    fn serde_round_trip() {
        let g = Guard::var(0).and(&Guard::var(2).or(&Guard::var(5).not()));
        let json = serde_json::to_string(&g).unwrap();
        let back: Guard = serde_json::from_str(&json).unwrap();
        assert_eq!(g, back);
    }

    /// Small formula AST used to cross-check BDD operations against direct
    /// evaluation over every assignment of 4 variables.
    #[derive(Debug, Clone)]
    enum Formula {
        Var(u32),
        Not(Box<Formula>),
        And(Box<Formula>, Box<Formula>),
        Or(Box<Formula>, Box<Formula>),
    }

    impl Formula {
        fn to_guard(&self) -> Guard {
            match self {
                Formula::Var(v) => Guard::var(*v),
                Formula::Not(f) => f.to_guard().not(),
                Formula::And(a, b) => a.to_guard().and(&b.to_guard()),
                Formula::Or(a, b) => a.to_guard().or(&b.to_guard()),
            }
        }

        fn eval(&self, bits: u8) -> bool {
            match self {
                Formula::Var(v) => bits & (1 << v) != 0,
                Formula::Not(f) => !f.eval(bits),
                Formula::And(a, b) => a.eval(bits) && b.eval(bits),
                Formula::Or(a, b) => a.eval(bits) || b.eval(bits),
            }
        }
    }

    fn formula() -> impl Strategy<Value = Formula> {
        let leaf = (0u32..4).prop_map(Formula::Var);
        leaf.prop_recursive(4, 32, 2, |inner| {
            prop_oneof![
                inner.clone().prop_map(|f| Formula::Not(Box::new(f))),
                (inner.clone(), inner.clone())
                    .prop_map(|(a, b)| Formula::And(Box::new(a), Box::new(b))),
                (inner.clone(), inner)
                    .prop_map(|(a, b)| Formula::Or(Box::new(a), Box::new(b))),
            ]
        })
    }

    proptest! {
        #[test]
        fn bdd_matches_truth_table(f in formula()) {
            let g = f.to_guard();
            for bits in 0u8..16 {
                prop_assert_eq!(g.eval(|v| bits & (1 << v) != 0), f.eval(bits));
            }
        }

        #[test]
        fn equivalent_formulas_are_equal(a in formula(), b in formula()) {
            let equivalent = (0u8..16).all(|bits| a.eval(bits) == b.eval(bits));
            prop_assert_eq!(a.to_guard() == b.to_guard(), equivalent);
        }
    }
}

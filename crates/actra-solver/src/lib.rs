//! Guard and value-summary algebra for the actra exploration engine.
//!
//! The engine treats path conditions and guarded values as opaque algebras;
//! this crate is the whole of that facade. Nothing here knows about
//! machines, schedules, or the search loop.

pub mod concretize;
pub mod guard;
pub mod vs;

pub use concretize::{concretize, SolverStats};
pub use guard::{Guard, VarAllocator};
pub use vs::{partition, GuardedValue, PrimitiveVS};

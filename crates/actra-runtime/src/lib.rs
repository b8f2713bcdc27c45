//! Machine, message, and program semantics for the actra exploration engine.
//!
//! The search scheduler drives this crate through machine ids: the runtime
//! owns every machine, and programs interact with the world only through
//! `EffectCtx`.

pub mod event;
pub mod machine;
pub mod message;
pub mod program;
pub mod runtime;
pub mod symmetry;
pub mod value;

pub use event::Event;
pub use machine::{Machine, MachineId, MachineSnapshot};
pub use message::Message;
pub use program::{DataSource, EffectCtx, Program, ProgramError, ProgramResult};
pub use runtime::{Runtime, SrcState};
pub use symmetry::{SymmetrySnapshot, SymmetryTracker};
pub use value::Value;

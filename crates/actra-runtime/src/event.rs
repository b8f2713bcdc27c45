//! Events carried by messages between machines.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An event a machine can send or handle.
///
/// The creation event is built in; everything else is declared by the
/// program under test. Synchronous events are dispatched as part of the
/// step that caused them and do not advance the step depth.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    name: String,
    kind: EventKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
enum EventKind {
    User,
    Sync,
    Create,
}

impl Event {
    /// A plain asynchronous user event.
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EventKind::User,
        }
    }

    /// A synchronous event: handled within the causing step.
    pub fn sync(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EventKind::Sync,
        }
    }

    /// The machine-creation event.
    pub fn create() -> Self {
        Self {
            name: "@create".into(),
            kind: EventKind::Create,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_create(&self) -> bool {
        self.kind == EventKind::Create
    }

    #[inline]
    pub fn is_sync(&self) -> bool {
        self.kind == EventKind::Sync
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

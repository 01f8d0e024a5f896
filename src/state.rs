//! Lifecycle states of a subject's refresh chain.
//!
//! ```text
//!             read_with_trigger                first successful write
//! Dormant ─────────────────────────→ Warming ─────────────────────────→ Warm ↺ (each compute)
//!    ↑                                                                    │
//!    └──────────── compute cycle finds the liveness marker expired ───────┘
//! ```
//!
//! States are never stored. [`ReactiveCache::state`](crate::ReactiveCache::state)
//! derives one from the liveness marker and the stored value on demand.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubjectState {
    /// No live marker. Reads return nothing even if a stale value exists.
    Dormant,

    /// Alive, but no value has been computed yet.
    Warming,

    /// Alive with a stored value; reads are served.
    Warm,
}

impl SubjectState {
    pub fn from_parts(alive: bool, has_value: bool) -> Self {
        match (alive, has_value) {
            (false, _) => SubjectState::Dormant,
            (true, false) => SubjectState::Warming,
            (true, true) => SubjectState::Warm,
        }
    }

    /// Whether a read right now would hand a value to the consumer.
    pub fn is_serving(&self) -> bool {
        matches!(self, SubjectState::Warm)
    }
}

impl fmt::Display for SubjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectState::Dormant => write!(f, "Dormant"),
            SubjectState::Warming => write!(f, "Warming"),
            SubjectState::Warm => write!(f, "Warm"),
        }
    }
}

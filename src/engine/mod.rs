// src/engine/mod.rs

//! Reactive orchestration engine.
//!
//! This module ties together:
//! - the append-only state store
//! - the condition/reaction matcher
//! - the serialized event loop that reacts to:
//!   - the engine-started event
//!   - task started/finished events coming back from service backends
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::event::Event;
use crate::state::StateSnapshot;
use crate::task::TaskStatus;

/// Signals flowing into the serialized engine loop.
///
/// `Published` carries a domain event (the bus itself); `Shutdown` is an
/// out-of-band request from the process layer (e.g. Ctrl-C).
#[derive(Debug, Clone)]
pub enum EngineSignal {
    Published(Event),
    Shutdown,
}

/// Outcome of a completed run, derived from the final state store.
///
/// A run that reached its fixed point is reported here even when tasks
/// failed and downstream reactions stalled; that is a user-visible but
/// non-crashing outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunSummary {
    pub(crate) fn from_snapshot(snapshot: &StateSnapshot) -> Self {
        let mut summary = RunSummary {
            total: snapshot.len(),
            ..Default::default()
        };
        for state in snapshot.tasks() {
            match state.status {
                TaskStatus::Success => summary.succeeded += 1,
                TaskStatus::Failed => summary.failed += 1,
                TaskStatus::Pending | TaskStatus::Running => {}
            }
        }
        summary
    }
}

pub mod core;
pub mod matcher;
pub mod runtime;

pub use self::core::{CoreCommand, CoreStep, EngineCore};
pub use self::matcher::Matcher;
pub use self::runtime::Engine;

// src/event.rs

//! Immutable engine events and the observer seam of the event bus.
//!
//! Events are published exactly once onto the serialized engine loop and
//! fanned out to registered [`EventListener`]s in registration order. A
//! listener that panics is isolated and logged; the run continues.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::task::{TaskName, TaskStatus};

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum EventKind {
    /// The engine has started and reactions may seed initial tasks.
    EngineStarted,
    /// A task was handed to its service backend and is now running.
    TaskStarted { task: TaskName },
    /// A task reached a terminal status.
    TaskFinished { task: TaskName, status: TaskStatus },
}

/// A single immutable event on the bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub kind: EventKind,
    pub at: DateTime<Utc>,
}

impl Event {
    pub fn now(kind: EventKind) -> Self {
        Self {
            kind,
            at: Utc::now(),
        }
    }

    /// The task this event refers to, if any.
    pub fn task(&self) -> Option<&str> {
        match &self.kind {
            EventKind::EngineStarted => None,
            EventKind::TaskStarted { task } | EventKind::TaskFinished { task, .. } => {
                Some(task.as_str())
            }
        }
    }
}

/// Read-only observer of published events.
///
/// Listeners run on the serialized event loop *before* the matcher
/// evaluates reactions for the event, in registration order. They must not
/// block; anything long-running belongs in a service backend.
pub trait EventListener: Send {
    fn on_event(&mut self, event: &Event);
}

/// Convenience listener wrapping a closure.
pub struct FnListener<F: FnMut(&Event) + Send>(pub F);

impl<F: FnMut(&Event) + Send> EventListener for FnListener<F> {
    fn on_event(&mut self, event: &Event) {
        (self.0)(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_task_reference() {
        let started = Event::now(EventKind::EngineStarted);
        assert_eq!(started.task(), None);

        let finished = Event::now(EventKind::TaskFinished {
            task: "clone".into(),
            status: TaskStatus::Success,
        });
        assert_eq!(finished.task(), Some("clone"));
    }
}

// src/state/mod.rs

//! Append-only state store for task states.
//!
//! The store is the authoritative record of every task the engine has ever
//! accepted in this run. It is owned by the engine core and mutated only on
//! the serialized event loop (single-writer); reactions and conditions see
//! copy-on-read [`StateSnapshot`]s that are consistent at the instant the
//! associated event was delivered.
//!
//! Invariants enforced here:
//! - task names are unique (duplicate registration is rejected)
//! - status transitions follow `Pending -> Running -> {Success, Failed}`
//!   exactly once, never backward
//! - the store only grows; tasks are never removed

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::errors::{ReflowError, Result};
use crate::task::{Task, TaskName, TaskStatus};

/// State of a single task, tracked from registration to terminal status.
#[derive(Debug, Clone)]
pub struct TaskState {
    pub task: Arc<Task>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskState {
    fn new(task: Task) -> Self {
        Self {
            task: Arc::new(task),
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.task.name
    }
}

/// Result of applying a terminal status to the store.
///
/// `Duplicate` means the exact (task, status) pair was already recorded;
/// the caller must treat the triggering event as already processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Updated,
    Duplicate,
}

/// Single-writer, append-only task state store.
#[derive(Debug, Default)]
pub struct StateStore {
    /// Insertion-ordered task states.
    states: Vec<TaskState>,
    /// Name -> index into `states`.
    index: HashMap<TaskName, usize>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Register a new task as `Pending`.
    ///
    /// Returns an error if a task with the same name already exists; task
    /// names are unique within a run and the caller decides whether that is
    /// a violation or a droppable duplicate.
    pub fn register(&mut self, task: Task) -> Result<()> {
        if self.index.contains_key(&task.name) {
            return Err(ReflowError::StateViolation(format!(
                "task '{}' is already registered",
                task.name
            )));
        }

        debug!(task = %task.name, service = %task.service, "state: registering task");
        self.index.insert(task.name.clone(), self.states.len());
        self.states.push(TaskState::new(task));
        Ok(())
    }

    /// Mark a task as `Running`.
    ///
    /// Marking an already-running or terminal task again is a no-op
    /// (redelivery tolerance); marking an unknown task is a violation.
    pub fn mark_running(&mut self, name: &str) -> Result<()> {
        let state = self.state_mut(name)?;
        match state.status {
            TaskStatus::Pending => {
                state.status = TaskStatus::Running;
                state.started_at = Some(Utc::now());
                Ok(())
            }
            _ => {
                debug!(task = %name, status = %state.status, "state: ignoring redundant running mark");
                Ok(())
            }
        }
    }

    /// Record a terminal status for a task.
    ///
    /// - first delivery: transition and return `Applied::Updated`
    /// - identical redelivery: return `Applied::Duplicate`
    /// - conflicting terminal status or non-terminal input: violation
    pub fn mark_finished(&mut self, name: &str, status: TaskStatus) -> Result<Applied> {
        if !status.is_terminal() {
            return Err(ReflowError::StateViolation(format!(
                "cannot finish task '{name}' with non-terminal status {status}"
            )));
        }

        let state = self.state_mut(name)?;
        match state.status {
            TaskStatus::Pending | TaskStatus::Running => {
                state.status = status;
                state.finished_at = Some(Utc::now());
                Ok(Applied::Updated)
            }
            existing if existing == status => Ok(Applied::Duplicate),
            existing => Err(ReflowError::StateViolation(format!(
                "task '{name}' already finished with {existing}; refusing transition to {status}"
            ))),
        }
    }

    /// Copy-on-read snapshot, consistent at the instant of the call.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            states: self.states.clone(),
        }
    }

    fn state_mut(&mut self, name: &str) -> Result<&mut TaskState> {
        let idx = *self.index.get(name).ok_or_else(|| {
            ReflowError::StateViolation(format!("status update for unknown task '{name}'"))
        })?;
        Ok(&mut self.states[idx])
    }
}

/// Read-only, isolated view of the store handed to conditions/reactions.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    states: Vec<TaskState>,
}

impl StateSnapshot {
    /// All task states, in insertion order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskState> {
        self.states.iter()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn status_of(&self, name: &str) -> Option<TaskStatus> {
        self.states
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.status)
    }

    /// Whether the named task reached any terminal status.
    pub fn finished(&self, name: &str) -> bool {
        self.status_of(name).is_some_and(|s| s.is_terminal())
    }

    /// Whether the named task reached exactly the given terminal status.
    pub fn finished_with(&self, name: &str, status: TaskStatus) -> bool {
        status.is_terminal() && self.status_of(name) == Some(status)
    }
}

// src/task.rs

//! Task model: a unit of work targeting a named service endpoint.

use serde::Serialize;
use serde_json::Value;

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Lifecycle status of a task.
///
/// Transitions are strictly `Pending -> Running -> {Success, Failed}`;
/// terminal states are final and the engine never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A single key-value argument forwarded verbatim to the service backend.
///
/// The engine core attaches no semantics to argument values; they are an
/// ordered list of heterogeneous values the target service interprets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Argument {
    pub key: String,
    pub value: Value,
}

impl Argument {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A unit of work produced by a reaction.
///
/// Immutable after creation; owned by the scheduler until it reaches a
/// terminal status. Task names must be unique within a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    /// Unique name within a run.
    pub name: TaskName,
    /// Target service name (must match a registered backend).
    pub service: String,
    /// Endpoint/operation on the target service.
    pub endpoint: String,
    /// Ordered argument list, forwarded to the service as-is.
    pub arguments: Vec<Argument>,
}

impl Task {
    pub fn new(
        name: impl Into<String>,
        service: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            service: service.into(),
            endpoint: endpoint.into(),
            arguments: Vec::new(),
        }
    }

    /// Builder-style helper to append an argument.
    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.push(Argument::new(key, value));
        self
    }

    /// Look up the first argument with the given key.
    pub fn argument(&self, key: &str) -> Option<&Value> {
        self.arguments
            .iter()
            .find(|a| a.key == key)
            .map(|a| &a.value)
    }
}

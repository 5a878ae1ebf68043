#![allow(dead_code)]

use reflow::condition::Condition;
use reflow::pipeline::{Pipeline, Reaction};
use reflow::task::{Task, TaskStatus};

/// Builder for [`Pipeline`] to simplify test setup.
pub struct PipelineBuilder {
    pipeline: Pipeline,
}

impl PipelineBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            pipeline: Pipeline::new(name).with_service("fake"),
        }
    }

    /// Register a reaction emitting a fixed set of tasks.
    pub fn with_emit(mut self, condition: Condition, tasks: Vec<Task>) -> Self {
        self.pipeline = self.pipeline.with_reaction(Reaction::emit(condition, tasks));
        self
    }

    pub fn with_reaction(mut self, reaction: Reaction) -> Self {
        self.pipeline = self.pipeline.with_reaction(reaction);
        self
    }

    /// Seed task produced at engine start.
    pub fn with_root(self, name: &str) -> Self {
        let task = TaskBuilder::new(name).build();
        self.with_emit(Condition::engine_started(), vec![task])
    }

    /// Task produced once all `deps` finished with success.
    pub fn with_step(self, name: &str, deps: &[&str]) -> Self {
        let task = TaskBuilder::new(name).build();
        let condition = if deps.len() == 1 {
            Condition::task_succeeded(deps[0])
        } else {
            Condition::all_of(deps.iter().map(|d| Condition::task_succeeded(*d)))
        };
        self.with_emit(condition, vec![task])
    }

    /// Several tasks produced from the same success condition (fan-out).
    pub fn with_fanout(self, names: &[&str], dep: &str) -> Self {
        let tasks = names.iter().map(|n| TaskBuilder::new(n).build()).collect();
        self.with_emit(Condition::task_succeeded(dep), tasks)
    }

    pub fn build(self) -> Pipeline {
        self.pipeline
    }
}

/// Builder for [`Task`].
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            task: Task::new(name, "fake", "run"),
        }
    }

    pub fn service(mut self, service: &str) -> Self {
        self.task.service = service.to_string();
        self
    }

    pub fn endpoint(mut self, endpoint: &str) -> Self {
        self.task.endpoint = endpoint.to_string();
        self
    }

    pub fn argument(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.task = self.task.with_argument(key, value);
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

// src/engine/core.rs

//! Pure core state machine.
//!
//! This module contains a synchronous, deterministic "engine core" that
//! consumes published [`Event`]s and produces:
//! - an updated state store
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Engine`) is responsible for:
//! - reading signals from channels
//! - handing accepted tasks to the dispatcher
//! - handling shutdown
//!
//! The core is intended to be extensively unit tested without any Tokio,
//! channels, or processes. All writes to the state store happen here, on
//! whatever serialized discipline the caller provides (in production, the
//! single event-loop consumer).
//!
//! Fixed-point termination: the core counts in-flight tasks (accepted but
//! not yet finished) and reports `keep_running = false` once the engine
//! has started and that counter returns to zero. Since the counter is only
//! touched inside `step`, the zero crossing is observed exactly once.

use tracing::{debug, warn};

use crate::errors::Result;
use crate::event::{Event, EventKind};
use crate::pipeline::Pipeline;
use crate::pipeline::validate::validate_pipeline;
use crate::state::{Applied, StateSnapshot, StateStore};
use crate::task::Task;

use super::{Matcher, RunSummary};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Hand these tasks to the dispatcher.
    DispatchTasks(Vec<Task>),
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer event loop should keep running.
    pub keep_running: bool,
}

/// Pure core state.
///
/// Owns the state store and the matcher. Has **no** channels, no Tokio
/// types, and performs no IO.
#[derive(Debug)]
pub struct EngineCore {
    store: StateStore,
    matcher: Matcher,
    started: bool,
    /// Tasks accepted for dispatch whose terminal event has not yet been
    /// processed.
    in_flight: usize,
}

impl EngineCore {
    /// Validate the pipeline and build a core from its reactions.
    pub fn new(pipeline: Pipeline) -> Result<Self> {
        validate_pipeline(&pipeline)?;
        Ok(Self {
            store: StateStore::new(),
            matcher: Matcher::new(pipeline.spec.reactions),
            started: false,
            in_flight: 0,
        })
    }

    /// Expose whether the run has reached its fixed point (for tests).
    pub fn is_quiescent(&self) -> bool {
        self.started && self.in_flight == 0
    }

    /// Read-only snapshot of the current state (for tests/diagnostics).
    pub fn snapshot(&self) -> StateSnapshot {
        self.store.snapshot()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::from_snapshot(&self.store.snapshot())
    }

    /// Handle a single published event, updating state and returning the
    /// resulting commands for the IO shell.
    ///
    /// Errors returned here are engine-fatal (state store violations); the
    /// shell aborts the run on them.
    pub fn step(&mut self, event: &Event) -> Result<CoreStep> {
        // Apply the event to the store first, so that reactions evaluating
        // for this event observe every update caused by earlier events plus
        // this one.
        match &event.kind {
            EventKind::EngineStarted => {
                if self.started {
                    warn!("duplicate engine-started event; ignoring");
                    return Ok(self.no_op());
                }
                self.started = true;
            }
            EventKind::TaskStarted { task } => {
                self.store.mark_running(task)?;
            }
            EventKind::TaskFinished { task, status } => {
                match self.store.mark_finished(task, *status)? {
                    Applied::Updated => {
                        self.in_flight = self.in_flight.saturating_sub(1);
                    }
                    Applied::Duplicate => {
                        // Already processed; re-running reactions here would
                        // break idempotence.
                        debug!(task = %task, status = %status, "duplicate finish event absorbed");
                        return Ok(self.no_op());
                    }
                }
            }
        }

        let snapshot = self.store.snapshot();
        let produced = self.matcher.evaluate(event, &snapshot);
        let accepted = self.accept(produced)?;

        let mut commands = Vec::new();
        if !accepted.is_empty() {
            commands.push(CoreCommand::DispatchTasks(accepted));
        }

        Ok(CoreStep {
            commands,
            keep_running: !self.is_quiescent(),
        })
    }

    /// Register produced tasks, dropping any whose name already exists.
    ///
    /// Task names are unique within a run; since finished-state conditions
    /// are monotonic, a reaction's condition stays true after it first
    /// fires, and this name check is what makes the re-fire harmless.
    fn accept(&mut self, produced: Vec<Task>) -> Result<Vec<Task>> {
        let mut accepted = Vec::new();

        for task in produced {
            if self.store.contains(&task.name) {
                warn!(
                    task = %task.name,
                    "task name already used in this run; dropping duplicate"
                );
                continue;
            }
            self.store.register(task.clone())?;
            self.in_flight += 1;
            accepted.push(task);
        }

        Ok(accepted)
    }

    fn no_op(&self) -> CoreStep {
        CoreStep {
            commands: Vec::new(),
            keep_running: !self.is_quiescent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::pipeline::Reaction;
    use crate::task::TaskStatus;

    fn task(name: &str) -> Task {
        Task::new(name, "shell", "run")
    }

    fn started() -> Event {
        Event::now(EventKind::EngineStarted)
    }

    fn finished(name: &str, status: TaskStatus) -> Event {
        Event::now(EventKind::TaskFinished {
            task: name.into(),
            status,
        })
    }

    fn chain_core() -> EngineCore {
        let pipeline = Pipeline::new("ci")
            .with_reaction(Reaction::emit(Condition::engine_started(), vec![task("a")]))
            .with_reaction(Reaction::emit(
                Condition::task_succeeded("a"),
                vec![task("b")],
            ));
        EngineCore::new(pipeline).unwrap()
    }

    fn dispatched(step: &CoreStep) -> Vec<String> {
        step.commands
            .iter()
            .flat_map(|c| match c {
                CoreCommand::DispatchTasks(tasks) => {
                    tasks.iter().map(|t| t.name.clone()).collect::<Vec<_>>()
                }
            })
            .collect()
    }

    #[test]
    fn engine_started_seeds_roots() {
        let mut core = chain_core();
        let step = core.step(&started()).unwrap();
        assert_eq!(dispatched(&step), vec!["a"]);
        assert!(step.keep_running);
    }

    #[test]
    fn completion_schedules_dependents_and_reaches_fixed_point() {
        let mut core = chain_core();
        core.step(&started()).unwrap();

        let step = core.step(&finished("a", TaskStatus::Success)).unwrap();
        assert_eq!(dispatched(&step), vec!["b"]);
        assert!(step.keep_running);

        let step = core.step(&finished("b", TaskStatus::Success)).unwrap();
        assert!(dispatched(&step).is_empty());
        assert!(!step.keep_running);
        assert!(core.is_quiescent());
    }

    #[test]
    fn failed_dependency_stalls_downstream() {
        let mut core = chain_core();
        core.step(&started()).unwrap();

        let step = core.step(&finished("a", TaskStatus::Failed)).unwrap();
        assert!(dispatched(&step).is_empty());
        // Nothing in flight and nothing to do: the run is over, with "b"
        // never scheduled.
        assert!(!step.keep_running);
        assert_eq!(core.snapshot().status_of("b"), None);
    }

    #[test]
    fn duplicate_finish_event_does_not_reschedule() {
        let mut core = chain_core();
        core.step(&started()).unwrap();
        core.step(&finished("a", TaskStatus::Success)).unwrap();

        let step = core.step(&finished("a", TaskStatus::Success)).unwrap();
        assert!(dispatched(&step).is_empty());
        // "b" is still in flight, so the run continues.
        assert!(step.keep_running);
    }

    #[test]
    fn empty_seed_reaction_terminates_immediately() {
        let pipeline = Pipeline::new("gated").with_reaction(Reaction::new(
            Condition::engine_started(),
            ["skipped"],
            |_, _| Vec::new(),
        ));
        let mut core = EngineCore::new(pipeline).unwrap();

        let step = core.step(&started()).unwrap();
        assert!(step.commands.is_empty());
        assert!(!step.keep_running);
    }

    #[test]
    fn finish_event_for_unknown_task_is_fatal() {
        let mut core = chain_core();
        core.step(&started()).unwrap();
        assert!(core.step(&finished("ghost", TaskStatus::Success)).is_err());
    }
}

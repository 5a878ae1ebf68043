// src/condition.rs

//! Conditions: pure predicates over an event and a state snapshot.
//!
//! Conditions are a closed set of tagged variants rather than arbitrary
//! closures, so that the pipeline validator can statically enumerate the
//! task names a condition references. The finished-state variants are
//! monotonic: once true for a snapshot, they stay true for every later
//! snapshot (the state store never removes tasks or rolls statuses back).

use crate::event::{Event, EventKind};
use crate::state::StateSnapshot;
use crate::task::{TaskName, TaskStatus};

/// Predicate evaluated against each published event and the state snapshot
/// taken at the instant of its delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// True exactly for the engine-started event.
    EngineStarted,
    /// The named task reached any terminal status.
    TaskFinished { task: TaskName },
    /// The named task reached the given terminal status.
    TaskFinishedWithStatus { task: TaskName, status: TaskStatus },
    /// All sub-conditions hold; order-independent across tracked outcomes.
    AllOf(Vec<Condition>),
}

impl Condition {
    pub fn engine_started() -> Self {
        Condition::EngineStarted
    }

    pub fn task_finished(task: impl Into<String>) -> Self {
        Condition::TaskFinished { task: task.into() }
    }

    pub fn task_finished_with(task: impl Into<String>, status: TaskStatus) -> Self {
        Condition::TaskFinishedWithStatus {
            task: task.into(),
            status,
        }
    }

    pub fn task_succeeded(task: impl Into<String>) -> Self {
        Self::task_finished_with(task, TaskStatus::Success)
    }

    pub fn all_of(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Condition::AllOf(conditions.into_iter().collect())
    }

    /// Evaluate against an event and the snapshot taken at its delivery.
    pub fn eval(&self, event: &Event, snapshot: &StateSnapshot) -> bool {
        match self {
            Condition::EngineStarted => matches!(event.kind, EventKind::EngineStarted),
            Condition::TaskFinished { task } => snapshot.finished(task),
            Condition::TaskFinishedWithStatus { task, status } => {
                snapshot.finished_with(task, *status)
            }
            Condition::AllOf(conditions) => {
                conditions.iter().all(|c| c.eval(event, snapshot))
            }
        }
    }

    /// Collect every task name this condition references.
    pub(crate) fn referenced_tasks<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::EngineStarted => {}
            Condition::TaskFinished { task }
            | Condition::TaskFinishedWithStatus { task, .. } => out.push(task),
            Condition::AllOf(conditions) => {
                for c in conditions {
                    c.referenced_tasks(out);
                }
            }
        }
    }

    /// Collect every status used in a finished-with-status variant,
    /// for registration-time validation (must be terminal).
    pub(crate) fn referenced_statuses(&self, out: &mut Vec<TaskStatus>) {
        match self {
            Condition::EngineStarted | Condition::TaskFinished { .. } => {}
            Condition::TaskFinishedWithStatus { status, .. } => out.push(*status),
            Condition::AllOf(conditions) => {
                for c in conditions {
                    c.referenced_statuses(out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateStore;
    use crate::task::Task;

    fn snapshot_after(
        completions: &[(&str, TaskStatus)],
    ) -> StateSnapshot {
        let mut store = StateStore::new();
        for (name, status) in completions {
            store.register(Task::new(*name, "shell", "run")).unwrap();
            store.mark_running(name).unwrap();
            store.mark_finished(name, *status).unwrap();
        }
        store.snapshot()
    }

    fn tick() -> Event {
        Event::now(EventKind::EngineStarted)
    }

    #[test]
    fn engine_started_matches_only_that_event() {
        let empty = StateSnapshot::default();
        assert!(Condition::engine_started().eval(&tick(), &empty));

        let other = Event::now(EventKind::TaskFinished {
            task: "clone".into(),
            status: TaskStatus::Success,
        });
        assert!(!Condition::engine_started().eval(&other, &empty));
    }

    #[test]
    fn finished_is_false_before_the_task_exists() {
        let empty = StateSnapshot::default();
        assert!(!Condition::task_finished("clone").eval(&tick(), &empty));
        assert!(!Condition::task_succeeded("clone").eval(&tick(), &empty));
    }

    #[test]
    fn finished_with_status_becomes_true_and_stays_true() {
        let cond = Condition::task_succeeded("clone");

        // Pending/Running are not terminal.
        let mut store = StateStore::new();
        store.register(Task::new("clone", "shell", "run")).unwrap();
        assert!(!cond.eval(&tick(), &store.snapshot()));
        store.mark_running("clone").unwrap();
        assert!(!cond.eval(&tick(), &store.snapshot()));

        store.mark_finished("clone", TaskStatus::Success).unwrap();
        assert!(cond.eval(&tick(), &store.snapshot()));

        // Later, unrelated events cannot flip it back.
        store.register(Task::new("other", "shell", "run")).unwrap();
        assert!(cond.eval(&tick(), &store.snapshot()));
    }

    #[test]
    fn finished_any_fires_on_failure_too() {
        let snap = snapshot_after(&[("clone", TaskStatus::Failed)]);
        assert!(Condition::task_finished("clone").eval(&tick(), &snap));
        assert!(!Condition::task_succeeded("clone").eval(&tick(), &snap));
    }

    #[test]
    fn all_of_requires_every_outcome() {
        let cond = Condition::all_of([
            Condition::task_succeeded("a"),
            Condition::task_succeeded("b"),
            Condition::task_finished_with("c", TaskStatus::Failed),
        ]);

        let partial = snapshot_after(&[("a", TaskStatus::Success), ("b", TaskStatus::Success)]);
        assert!(!cond.eval(&tick(), &partial));

        let full = snapshot_after(&[
            ("c", TaskStatus::Failed),
            ("a", TaskStatus::Success),
            ("b", TaskStatus::Success),
        ]);
        assert!(cond.eval(&tick(), &full));
    }

    #[test]
    fn referenced_tasks_are_collected_recursively() {
        let cond = Condition::all_of([
            Condition::task_succeeded("a"),
            Condition::all_of([
                Condition::task_finished("b"),
                Condition::engine_started(),
            ]),
        ]);

        let mut refs = Vec::new();
        cond.referenced_tasks(&mut refs);
        assert_eq!(refs, vec!["a", "b"]);
    }
}

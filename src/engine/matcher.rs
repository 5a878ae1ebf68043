// src/engine/matcher.rs

//! Condition/reaction matching.
//!
//! For every incoming event the matcher evaluates every registered
//! reaction's condition against the event and the state snapshot taken at
//! its delivery, in registration order, and collects the produced tasks.
//!
//! A panic inside a reaction body is isolated to that reaction: it is
//! logged and the remaining reactions still run. Conditions themselves are
//! plain data (see [`crate::condition::Condition`]) and cannot panic.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{debug, error};

use crate::event::Event;
use crate::pipeline::Reaction;
use crate::state::StateSnapshot;
use crate::task::Task;

#[derive(Debug)]
pub struct Matcher {
    reactions: Vec<Reaction>,
}

impl Matcher {
    pub fn new(reactions: Vec<Reaction>) -> Self {
        Self { reactions }
    }

    /// Evaluate all reactions against `event` and `snapshot`, in
    /// registration order, returning every produced task.
    pub fn evaluate(&self, event: &Event, snapshot: &StateSnapshot) -> Vec<Task> {
        let mut produced = Vec::new();

        for (idx, reaction) in self.reactions.iter().enumerate() {
            if !reaction.condition.eval(event, snapshot) {
                continue;
            }

            match catch_unwind(AssertUnwindSafe(|| reaction.run(event, snapshot))) {
                Ok(tasks) => {
                    if tasks.is_empty() {
                        // Declared no-op, e.g. an environment-gated step.
                        debug!(reaction = idx, "reaction fired with no tasks");
                    } else {
                        debug!(
                            reaction = idx,
                            count = tasks.len(),
                            "reaction produced tasks"
                        );
                        produced.extend(tasks);
                    }
                }
                Err(panic) => {
                    let msg = panic_message(&panic);
                    error!(
                        reaction = idx,
                        panic = %msg,
                        "reaction panicked; skipping it for this event"
                    );
                }
            }
        }

        produced
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::event::EventKind;

    fn task(name: &str) -> Task {
        Task::new(name, "shell", "run")
    }

    fn started() -> Event {
        Event::now(EventKind::EngineStarted)
    }

    #[test]
    fn reactions_evaluate_in_registration_order() {
        let matcher = Matcher::new(vec![
            Reaction::emit(Condition::engine_started(), vec![task("first")]),
            Reaction::emit(Condition::engine_started(), vec![task("second")]),
        ]);

        let produced = matcher.evaluate(&started(), &StateSnapshot::default());
        let names: Vec<_> = produced.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn unmatched_conditions_produce_nothing() {
        let matcher = Matcher::new(vec![Reaction::emit(
            Condition::task_succeeded("ghost"),
            vec![task("a")],
        )]);

        assert!(matcher.evaluate(&started(), &StateSnapshot::default()).is_empty());
    }

    #[test]
    fn panicking_reaction_is_isolated() {
        let matcher = Matcher::new(vec![
            Reaction::new(Condition::engine_started(), ["a"], |_, _| {
                panic!("reaction bug")
            }),
            Reaction::emit(Condition::engine_started(), vec![task("b")]),
        ]);

        let produced = matcher.evaluate(&started(), &StateSnapshot::default());
        let names: Vec<_> = produced.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["b"]);
    }

    #[test]
    fn empty_reaction_output_is_a_no_op() {
        let matcher = Matcher::new(vec![Reaction::new(
            Condition::engine_started(),
            Vec::<String>::new(),
            |_, _| Vec::new(),
        )]);

        assert!(matcher.evaluate(&started(), &StateSnapshot::default()).is_empty());
    }
}

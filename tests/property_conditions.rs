// tests/property_conditions.rs

use proptest::prelude::*;

use reflow::condition::Condition;
use reflow::event::{Event, EventKind};
use reflow::state::{Applied, StateStore};
use reflow::task::{Task, TaskStatus};

fn tick() -> Event {
    Event::now(EventKind::EngineStarted)
}

fn apply_completion(store: &mut StateStore, name: &str, status: TaskStatus) {
    if !store.contains(name) {
        store.register(Task::new(name, "fake", "run")).unwrap();
        store.mark_running(name).unwrap();
    }
    let _ = store.mark_finished(name, status);
}

proptest! {
    /// An AND-combinator over four tracked outcomes becomes true exactly
    /// when the last required outcome lands, regardless of arrival order,
    /// and never before.
    #[test]
    fn all_of_is_order_independent(
        order in Just(vec![
            ("a", TaskStatus::Success),
            ("b", TaskStatus::Success),
            ("c", TaskStatus::Failed),
            ("d", TaskStatus::Success),
        ]).prop_shuffle()
    ) {
        let cond = Condition::all_of([
            Condition::task_succeeded("a"),
            Condition::task_succeeded("b"),
            Condition::task_finished_with("c", TaskStatus::Failed),
            Condition::task_succeeded("d"),
        ]);

        let mut store = StateStore::new();
        for (i, (name, status)) in order.iter().enumerate() {
            // Strictly before the last arrival the condition must be false.
            prop_assert!(!cond.eval(&tick(), &store.snapshot()),
                "condition true after only {i} completions");
            apply_completion(&mut store, name, *status);
        }
        prop_assert!(cond.eval(&tick(), &store.snapshot()));
    }

    /// A wrong terminal status on any branch keeps the combinator false
    /// forever (terminal states are final; no retries exist).
    #[test]
    fn all_of_stays_false_when_a_branch_fails(
        order in Just(vec!["a", "b", "c", "d"]).prop_shuffle(),
        wrong_idx in 0usize..4,
    ) {
        let cond = Condition::all_of(
            ["a", "b", "c", "d"].map(Condition::task_succeeded),
        );

        let wrong = order[wrong_idx];
        let mut store = StateStore::new();
        for name in &order {
            let status = if *name == wrong { TaskStatus::Failed } else { TaskStatus::Success };
            apply_completion(&mut store, name, status);
        }
        prop_assert!(!cond.eval(&tick(), &store.snapshot()));
    }

    /// Monotonicity: once a finished-with-status condition is true it
    /// stays true under any further completions of other tasks.
    #[test]
    fn finished_condition_is_monotonic(
        later in proptest::collection::vec(
            ("[a-z]{1,6}", prop_oneof![Just(TaskStatus::Success), Just(TaskStatus::Failed)]),
            0..8,
        )
    ) {
        let cond = Condition::task_succeeded("anchor");

        let mut store = StateStore::new();
        apply_completion(&mut store, "anchor", TaskStatus::Success);
        prop_assert!(cond.eval(&tick(), &store.snapshot()));

        for (name, status) in later {
            if name != "anchor" {
                apply_completion(&mut store, &name, status);
            }
            prop_assert!(cond.eval(&tick(), &store.snapshot()));
        }
    }

    /// The store reflects exactly the first terminal status per task, no
    /// matter how events are duplicated, and only the first application
    /// reports `Updated`.
    #[test]
    fn store_deduplicates_redelivered_completions(
        names in proptest::collection::vec("[a-d]", 1..20),
    ) {
        let mut store = StateStore::new();
        let mut first_updates = 0usize;

        for name in &names {
            if !store.contains(name) {
                store.register(Task::new(name.as_str(), "fake", "run")).unwrap();
                store.mark_running(name).unwrap();
            }
            let applied = store.mark_finished(name, TaskStatus::Success);
            prop_assert!(applied.is_ok(), "unexpected error: {applied:?}");
            if let Ok(Applied::Updated) = applied {
                first_updates += 1;
            }
        }

        let distinct: std::collections::HashSet<_> = names.iter().collect();
        prop_assert_eq!(first_updates, distinct.len());
        prop_assert_eq!(store.snapshot().len(), distinct.len());
        for name in distinct {
            prop_assert!(store.snapshot().finished_with(name, TaskStatus::Success));
        }
    }
}

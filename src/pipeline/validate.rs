// src/pipeline/validate.rs

//! Registration-time pipeline validation.
//!
//! Dependencies between tasks are expressed as conditions on prior task
//! completion, so a typo in a task name silently stalls a pipeline at
//! runtime. Validation catches that class of mistake up front:
//!
//! - every task name referenced by a condition must be declared as
//!   produced by some reaction
//! - no two reactions may declare the same produced task name
//! - `TaskFinishedWithStatus` conditions must use a terminal status
//! - the produced-by/waits-on graph must be acyclic

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{ReflowError, Result};
use crate::pipeline::Pipeline;

pub fn validate_pipeline(pipeline: &Pipeline) -> Result<()> {
    ensure_has_reactions(pipeline)?;
    let producers = collect_producers(pipeline)?;
    validate_condition_references(pipeline, &producers)?;
    validate_condition_statuses(pipeline)?;
    validate_dependency_graph(pipeline, &producers)?;
    Ok(())
}

fn ensure_has_reactions(pipeline: &Pipeline) -> Result<()> {
    if pipeline.spec.reactions.is_empty() {
        return Err(ReflowError::ValidationError(format!(
            "pipeline '{}' declares no reactions",
            pipeline.name()
        )));
    }
    Ok(())
}

/// Map each declared produced task name to the index of its reaction,
/// rejecting duplicates (task names must be unique within a run).
fn collect_producers(pipeline: &Pipeline) -> Result<HashMap<&str, usize>> {
    let mut producers: HashMap<&str, usize> = HashMap::new();

    for (idx, reaction) in pipeline.spec.reactions.iter().enumerate() {
        for name in &reaction.produces {
            if let Some(prev) = producers.insert(name.as_str(), idx) {
                return Err(ReflowError::ValidationError(format!(
                    "task '{name}' is declared by reactions #{prev} and #{idx}; \
                     task names must have exactly one producer"
                )));
            }
        }
    }

    Ok(producers)
}

fn validate_condition_references(
    pipeline: &Pipeline,
    producers: &HashMap<&str, usize>,
) -> Result<()> {
    for (idx, reaction) in pipeline.spec.reactions.iter().enumerate() {
        let mut refs = Vec::new();
        reaction.condition.referenced_tasks(&mut refs);

        for task in refs {
            if !producers.contains_key(task) {
                return Err(ReflowError::ValidationError(format!(
                    "reaction #{idx} waits on task '{task}', which no reaction produces"
                )));
            }
        }
    }
    Ok(())
}

fn validate_condition_statuses(pipeline: &Pipeline) -> Result<()> {
    for (idx, reaction) in pipeline.spec.reactions.iter().enumerate() {
        let mut statuses = Vec::new();
        reaction.condition.referenced_statuses(&mut statuses);

        for status in statuses {
            if !status.is_terminal() {
                return Err(ReflowError::ValidationError(format!(
                    "reaction #{idx} waits on status '{status}', which a task can \
                     never finish with"
                )));
            }
        }
    }
    Ok(())
}

/// Build a graph with an edge `waited-on task -> produced task` for every
/// reaction, then topologically sort it. A cycle means a set of tasks that
/// can only be produced after themselves, i.e. a pipeline that can never
/// make progress through that region.
fn validate_dependency_graph(
    pipeline: &Pipeline,
    producers: &HashMap<&str, usize>,
) -> Result<()> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in producers.keys() {
        graph.add_node(*name);
    }

    for reaction in &pipeline.spec.reactions {
        let mut refs = Vec::new();
        reaction.condition.referenced_tasks(&mut refs);

        for dep in refs {
            for produced in &reaction.produces {
                graph.add_edge(dep, produced.as_str(), ());
            }
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(ReflowError::DependencyCycle(format!(
                "cycle in condition dependencies involving task '{node}'"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::pipeline::Reaction;
    use crate::task::{Task, TaskStatus};

    fn task(name: &str) -> Task {
        Task::new(name, "shell", "run")
    }

    #[test]
    fn valid_chain_passes() {
        let pipeline = Pipeline::new("ci")
            .with_reaction(Reaction::emit(
                Condition::engine_started(),
                vec![task("a")],
            ))
            .with_reaction(Reaction::emit(
                Condition::task_succeeded("a"),
                vec![task("b"), task("c")],
            ));

        assert!(validate_pipeline(&pipeline).is_ok());
    }

    #[test]
    fn dangling_reference_is_rejected() {
        let pipeline = Pipeline::new("ci").with_reaction(Reaction::emit(
            Condition::task_succeeded("missing"),
            vec![task("a")],
        ));

        let err = validate_pipeline(&pipeline).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn duplicate_producer_is_rejected() {
        let pipeline = Pipeline::new("ci")
            .with_reaction(Reaction::emit(Condition::engine_started(), vec![task("a")]))
            .with_reaction(Reaction::emit(Condition::engine_started(), vec![task("a")]));

        assert!(validate_pipeline(&pipeline).is_err());
    }

    #[test]
    fn non_terminal_condition_status_is_rejected() {
        let pipeline = Pipeline::new("ci")
            .with_reaction(Reaction::emit(Condition::engine_started(), vec![task("a")]))
            .with_reaction(Reaction::emit(
                Condition::task_finished_with("a", TaskStatus::Running),
                vec![task("b")],
            ));

        assert!(validate_pipeline(&pipeline).is_err());
    }

    #[test]
    fn dependency_cycle_is_rejected() {
        let pipeline = Pipeline::new("ci")
            .with_reaction(Reaction::emit(
                Condition::task_succeeded("b"),
                vec![task("a")],
            ))
            .with_reaction(Reaction::emit(
                Condition::task_succeeded("a"),
                vec![task("b")],
            ));

        let err = validate_pipeline(&pipeline).unwrap_err();
        assert!(matches!(err, ReflowError::DependencyCycle(_)));
    }

    #[test]
    fn empty_pipeline_is_rejected() {
        assert!(validate_pipeline(&Pipeline::new("empty")).is_err());
    }
}

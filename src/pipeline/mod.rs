// src/pipeline/mod.rs

//! Pipeline model: the root configuration object consumed once by the
//! engine at startup.
//!
//! A pipeline is a name, a set of service declarations, and an ordered
//! list of [`Reaction`]s. Reactions are registered once and never change;
//! their evaluation order is registration order, which keeps snapshots
//! deterministic for dependent reactions.

pub mod validate;

use crate::condition::Condition;
use crate::event::Event;
use crate::state::StateSnapshot;
use crate::task::{Task, TaskName};

/// Reaction body: pure function of (event, snapshot) producing new tasks.
///
/// Returning an empty vector is a normal no-op (e.g. a step gated on an
/// absent secret), never an error.
pub type ReactionFn = Box<dyn Fn(&Event, &StateSnapshot) -> Vec<Task> + Send>;

/// A condition-triggered producer of tasks.
pub struct Reaction {
    pub condition: Condition,
    /// Task names this reaction may emit. Used at registration time to
    /// validate that conditions reference names some reaction produces;
    /// emitting an undeclared name at runtime is logged but allowed.
    pub produces: Vec<TaskName>,
    run: ReactionFn,
}

impl Reaction {
    pub fn new(
        condition: Condition,
        produces: impl IntoIterator<Item = impl Into<String>>,
        run: impl Fn(&Event, &StateSnapshot) -> Vec<Task> + Send + 'static,
    ) -> Self {
        Self {
            condition,
            produces: produces.into_iter().map(Into::into).collect(),
            run: Box::new(run),
        }
    }

    /// Shorthand for a reaction that always emits the same fixed task list.
    pub fn emit(condition: Condition, tasks: Vec<Task>) -> Self {
        let produces: Vec<TaskName> = tasks.iter().map(|t| t.name.clone()).collect();
        Self::new(condition, produces, move |_ev, _snap| tasks.clone())
    }

    pub fn run(&self, event: &Event, snapshot: &StateSnapshot) -> Vec<Task> {
        (self.run)(event, snapshot)
    }
}

impl std::fmt::Debug for Reaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reaction")
            .field("condition", &self.condition)
            .field("produces", &self.produces)
            .finish_non_exhaustive()
    }
}

/// Declaration of a service the pipeline's tasks may target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDecl {
    pub name: String,
}

impl ServiceDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineMetadata {
    pub name: String,
}

#[derive(Debug, Default)]
pub struct PipelineSpec {
    pub services: Vec<ServiceDecl>,
    pub reactions: Vec<Reaction>,
}

/// Root configuration object; read-only after engine start.
#[derive(Debug, Default)]
pub struct Pipeline {
    pub metadata: PipelineMetadata,
    pub spec: PipelineSpec,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: PipelineMetadata { name: name.into() },
            spec: PipelineSpec::default(),
        }
    }

    pub fn with_service(mut self, name: impl Into<String>) -> Self {
        self.spec.services.push(ServiceDecl::new(name));
        self
    }

    pub fn with_reaction(mut self, reaction: Reaction) -> Self {
        self.spec.reactions.push(reaction);
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

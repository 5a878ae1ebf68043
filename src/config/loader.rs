// src/config/loader.rs

//! Loading and compiling declarative pipeline files.
//!
//! `load_and_validate` reads TOML into a [`ConfigFile`]; `build_pipeline`
//! compiles that into the engine's [`Pipeline`] model:
//!
//! - a task with no dependencies reacts to the engine-started event
//! - `after = [...]` becomes finished-with-success conditions
//! - `after_any = [...]` becomes finished-with-any-status conditions
//! - `require_env` gates the reaction: when a required variable is unset
//!   the reaction returns no tasks, which the engine treats as a normal
//!   no-op
//!
//! The compiled pipeline still goes through registration-time validation
//! (`pipeline::validate`), which catches dependency cycles.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::condition::Condition;
use crate::config::model::{ConfigFile, DefaultSection, RawConfigFile, TaskConfig};
use crate::errors::Result;
use crate::pipeline::{Pipeline, Reaction};
use crate::task::Task;

/// Load a configuration file and return the raw, unvalidated form.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run basic validation.
///
/// This is the recommended entry point for the rest of the application.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Compile a validated config into a [`Pipeline`].
pub fn build_pipeline(cfg: &ConfigFile) -> Pipeline {
    let mut pipeline = Pipeline::new(cfg.pipeline.name.clone()).with_service("shell");

    for (name, task_cfg) in cfg.task.iter() {
        let condition = condition_for(task_cfg);
        let template = TaskTemplate::compile(name, task_cfg, &cfg.default);

        pipeline = pipeline.with_reaction(Reaction::new(
            condition,
            [name.clone()],
            move |_event, _snapshot| template.instantiate(),
        ));
    }

    pipeline
}

fn condition_for(task_cfg: &TaskConfig) -> Condition {
    let mut conditions: Vec<Condition> = task_cfg
        .after
        .iter()
        .map(Condition::task_succeeded)
        .chain(task_cfg.after_any.iter().map(Condition::task_finished))
        .collect();

    match conditions.len() {
        0 => Condition::engine_started(),
        1 => conditions.remove(0),
        _ => Condition::AllOf(conditions),
    }
}

/// Everything needed to build the concrete [`Task`] when the reaction
/// fires. Environment lookups happen at fire time, not compile time, so
/// the pipeline observes the process environment as it is when the step
/// becomes ready.
#[derive(Debug, Clone)]
struct TaskTemplate {
    name: String,
    service: String,
    endpoint: String,
    script: Option<String>,
    path: Option<String>,
    env: Vec<String>,
    pass_env: Vec<String>,
    require_env: Vec<String>,
    workdir: Option<String>,
    timeout: Option<u64>,
}

impl TaskTemplate {
    fn compile(name: &str, task_cfg: &TaskConfig, defaults: &DefaultSection) -> Self {
        let mut env = defaults.env.clone();
        env.extend(task_cfg.env.iter().cloned());

        Self {
            name: name.to_string(),
            service: task_cfg.service.clone(),
            endpoint: task_cfg.endpoint.clone(),
            script: (!task_cfg.commands.is_empty()).then(|| join_commands(&task_cfg.commands)),
            path: task_cfg.path.clone(),
            env,
            pass_env: task_cfg.pass_env.clone(),
            require_env: task_cfg.require_env.clone(),
            workdir: task_cfg.workdir.clone().or_else(|| defaults.workdir.clone()),
            timeout: task_cfg.timeout.or(defaults.timeout),
        }
    }

    /// Produce the task list for one reaction firing: one task, or none
    /// when a required environment variable is missing.
    fn instantiate(&self) -> Vec<Task> {
        for var in &self.require_env {
            if std::env::var(var).map(|v| v.is_empty()).unwrap_or(true) {
                info!(
                    task = %self.name,
                    missing = %var,
                    "required environment variable unset; skipping task"
                );
                return Vec::new();
            }
        }

        let mut task = Task::new(&self.name, &self.service, &self.endpoint);

        if let Some(path) = &self.path {
            task = task.with_argument("path", path.as_str());
        }
        if let Some(script) = &self.script {
            task = task.with_argument("script", script.as_str());
        }

        let mut env = self.env.clone();
        for var in &self.pass_env {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    env.push(format!("{var}={value}"));
                }
            }
        }
        if !env.is_empty() {
            task = task.with_argument("env", env);
        }

        if let Some(workdir) = &self.workdir {
            task = task.with_argument("workdir", workdir.as_str());
        }
        if let Some(timeout) = self.timeout {
            task = task.with_argument("timeout", timeout);
        }

        vec![task]
    }
}

/// Join commands into a single fail-fast shell script.
fn join_commands(commands: &[String]) -> String {
    let mut parts = vec!["set -e".to_string()];
    parts.extend(commands.iter().cloned());
    parts.join(" ; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_join_with_fail_fast_prefix() {
        let script = join_commands(&["cd core".into(), "make test".into()]);
        assert_eq!(script, "set -e ; cd core ; make test");
    }

    #[test]
    fn root_task_reacts_to_engine_started() {
        let raw: RawConfigFile = toml::from_str(
            r#"
            [task.clone]
            commands = ["git clone repo"]
            "#,
        )
        .unwrap();
        let cfg = ConfigFile::try_from(raw).unwrap();
        let pipeline = build_pipeline(&cfg);

        assert_eq!(pipeline.spec.reactions.len(), 1);
        assert_eq!(
            pipeline.spec.reactions[0].condition,
            Condition::engine_started()
        );
    }

    #[test]
    fn dependencies_compile_to_conditions() {
        let raw: RawConfigFile = toml::from_str(
            r#"
            [task.a]
            commands = ["true"]

            [task.b]
            commands = ["true"]

            [task.c]
            commands = ["true"]
            after = ["a"]
            after_any = ["b"]
            "#,
        )
        .unwrap();
        let cfg = ConfigFile::try_from(raw).unwrap();
        let pipeline = build_pipeline(&cfg);

        // BTreeMap order: a, b, c.
        assert_eq!(
            pipeline.spec.reactions[2].condition,
            Condition::all_of([
                Condition::task_succeeded("a"),
                Condition::task_finished("b"),
            ])
        );
    }
}

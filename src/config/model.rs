// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Top-level declarative pipeline file as read from TOML.
///
/// ```toml
/// [pipeline]
/// name = "core-ci"
///
/// [default]
/// workdir = "workspace"
/// env = ["CI=true"]
///
/// [task.clone]
/// commands = ["git clone https://example.com/repo"]
/// after = ["create-workspace"]
/// ```
///
/// All sections except `[task.*]` are optional and have defaults. This raw
/// form is unvalidated; convert it to [`ConfigFile`] before use.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// `[pipeline]` metadata.
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Defaults applied to every task from `[default]`.
    #[serde(default)]
    pub default: DefaultSection,

    /// All tasks from `[task.<name>]`.
    ///
    /// Keys are the task names; the map is ordered, which fixes reaction
    /// registration order deterministically.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSection {
    #[serde(default = "default_pipeline_name")]
    pub name: String,
}

fn default_pipeline_name() -> String {
    "reflow".to_string()
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            name: default_pipeline_name(),
        }
    }
}

/// `[default]` section: settings merged into every `run` task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultSection {
    /// Default working directory for shell tasks.
    pub workdir: Option<String>,

    /// Environment entries (`"K=V"`) prepended to every task's `env`.
    #[serde(default)]
    pub env: Vec<String>,

    /// Default wall-clock timeout in seconds.
    pub timeout: Option<u64>,
}

/// One `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Target service; defaults to the built-in shell backend.
    #[serde(default = "default_service")]
    pub service: String,

    /// Service endpoint; defaults to `run`.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Commands joined into a single `set -e ; …` script (`run` endpoint).
    #[serde(default)]
    pub commands: Vec<String>,

    /// Directory to create (`create-dir` endpoint).
    pub path: Option<String>,

    /// Literal environment entries (`"K=V"`).
    #[serde(default)]
    pub env: Vec<String>,

    /// Names of parent-process environment variables forwarded into the
    /// task when set; unset ones are silently skipped.
    #[serde(default)]
    pub pass_env: Vec<String>,

    /// Environment variables that must be set for this task to be emitted
    /// at all. When any is missing the task's reaction is a declared
    /// no-op, not an error.
    #[serde(default)]
    pub require_env: Vec<String>,

    /// Working directory override.
    pub workdir: Option<String>,

    /// Wall-clock timeout override in seconds.
    pub timeout: Option<u64>,

    /// Tasks that must finish with success before this one runs.
    #[serde(default)]
    pub after: Vec<String>,

    /// Tasks that must finish with any terminal status before this one runs.
    #[serde(default)]
    pub after_any: Vec<String>,
}

fn default_service() -> String {
    "shell".to_string()
}

fn default_endpoint() -> String {
    "run".to_string()
}

/// Validated configuration.
///
/// Construction goes through `TryFrom<RawConfigFile>` (see `validate.rs`),
/// so holding a `ConfigFile` means the task sections are internally
/// consistent. Cross-task dependency validation (dangling references,
/// cycles) happens again at pipeline registration, on the compiled
/// condition table.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub pipeline: PipelineSection,
    pub default: DefaultSection,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        pipeline: PipelineSection,
        default: DefaultSection,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self {
            pipeline,
            default,
            task,
        }
    }
}

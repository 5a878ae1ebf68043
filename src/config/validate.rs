// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile, TaskConfig};
use crate::errors::{ReflowError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::ReflowError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.pipeline, raw.default, raw.task))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    for (name, task) in cfg.task.iter() {
        validate_endpoint_fields(name, task)?;
        validate_dependencies(cfg, name, task)?;
    }
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(ReflowError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

/// Endpoint-specific field checks for the built-in shell service. Tasks
/// targeting other services are passed through untouched; their argument
/// semantics belong to that backend.
fn validate_endpoint_fields(name: &str, task: &TaskConfig) -> Result<()> {
    if task.service != "shell" {
        return Ok(());
    }

    match task.endpoint.as_str() {
        "run" => {
            if task.commands.is_empty() {
                return Err(ReflowError::ConfigError(format!(
                    "task '{name}' uses the run endpoint but has no `commands`"
                )));
            }
        }
        "create-dir" => {
            if task.path.is_none() {
                return Err(ReflowError::ConfigError(format!(
                    "task '{name}' uses the create-dir endpoint but has no `path`"
                )));
            }
        }
        other => {
            return Err(ReflowError::ConfigError(format!(
                "task '{name}' targets unknown shell endpoint '{other}'"
            )));
        }
    }
    Ok(())
}

fn validate_dependencies(cfg: &RawConfigFile, name: &str, task: &TaskConfig) -> Result<()> {
    for dep in task.after.iter().chain(task.after_any.iter()) {
        if !cfg.task.contains_key(dep) {
            return Err(ReflowError::ConfigError(format!(
                "task '{name}' has unknown dependency '{dep}'"
            )));
        }
        if dep == name {
            return Err(ReflowError::ConfigError(format!(
                "task '{name}' cannot depend on itself"
            )));
        }
    }
    Ok(())
}

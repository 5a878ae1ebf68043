// src/service/shell.rs

//! Production shell service backend.
//!
//! Executes task endpoints as local processes, the seam the engine's
//! designers expect heavier runners (containers, remote workers) to plug
//! into. Endpoints:
//!
//! - `run`: execute a shell script.
//!   - `script` (string, required): passed to `sh -c` (or `cmd /C`).
//!   - `env` (array of `"K=V"` strings, optional): extra environment.
//!   - `workdir` (string, optional): working directory for the process.
//!   - `timeout` (integer seconds, optional): wall-clock limit enforced
//!     here, not by the engine core; on expiry the process is killed and
//!     the task fails.
//! - `create-dir`: create a directory (and parents).
//!   - `path` (string, required).

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::task::Argument;

use super::Service;

#[derive(Debug, Clone, Copy, Default)]
pub struct ShellService;

impl ShellService {
    pub fn new() -> Self {
        Self
    }
}

impl Service for ShellService {
    fn call(
        &self,
        endpoint: &str,
        arguments: &[Argument],
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let endpoint = endpoint.to_string();
        let arguments = arguments.to_vec();

        Box::pin(async move {
            match endpoint.as_str() {
                "run" => run_script(&arguments).await,
                "create-dir" => create_dir(&arguments).await,
                other => bail!("shell service has no endpoint '{other}'"),
            }
        })
    }
}

async fn create_dir(arguments: &[Argument]) -> Result<()> {
    let path = required_str(arguments, "path")?;
    info!(path = %path, "creating directory");
    tokio::fs::create_dir_all(path)
        .await
        .with_context(|| format!("creating directory '{path}'"))?;
    Ok(())
}

async fn run_script(arguments: &[Argument]) -> Result<()> {
    let script = required_str(arguments, "script")?;
    let env = optional_str_list(arguments, "env")?;
    let workdir = optional_str(arguments, "workdir")?;
    let timeout = optional_u64(arguments, "timeout")?;

    info!(script = %script, "starting shell task");

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(script);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(script);
        c
    };

    for entry in env {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("env entry '{entry}' is not of the form K=V"))?;
        cmd.env(key, value);
    }

    if let Some(dir) = workdir {
        cmd.current_dir(dir);
    }

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().context("spawning shell process")?;

    // Drain both pipes so buffers don't fill; log at debug.
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("stdout: {}", line);
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("stderr: {}", line);
            }
        });
    }

    let status = match timeout {
        Some(secs) => {
            match tokio::time::timeout(Duration::from_secs(secs), child.wait()).await {
                Ok(status) => status.context("waiting for shell process")?,
                Err(_elapsed) => {
                    warn!(timeout_secs = secs, "shell task exceeded its timeout; killing it");
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "failed to kill timed-out process");
                    }
                    bail!("timed out after {secs}s");
                }
            }
        }
        None => child.wait().await.context("waiting for shell process")?,
    };

    if status.success() {
        Ok(())
    } else {
        bail!("exited with code {}", status.code().unwrap_or(-1))
    }
}

fn required_str<'a>(arguments: &'a [Argument], key: &str) -> Result<&'a str> {
    optional_str(arguments, key)?
        .ok_or_else(|| anyhow!("missing required argument '{key}'"))
}

fn optional_str<'a>(arguments: &'a [Argument], key: &str) -> Result<Option<&'a str>> {
    match arguments.iter().find(|a| a.key == key) {
        None => Ok(None),
        Some(arg) => arg
            .value
            .as_str()
            .map(Some)
            .ok_or_else(|| anyhow!("argument '{key}' must be a string")),
    }
}

fn optional_u64(arguments: &[Argument], key: &str) -> Result<Option<u64>> {
    match arguments.iter().find(|a| a.key == key) {
        None => Ok(None),
        Some(arg) => arg
            .value
            .as_u64()
            .map(Some)
            .ok_or_else(|| anyhow!("argument '{key}' must be a non-negative integer")),
    }
}

fn optional_str_list(arguments: &[Argument], key: &str) -> Result<Vec<String>> {
    match arguments.iter().find(|a| a.key == key) {
        None => Ok(Vec::new()),
        Some(arg) => {
            let list = arg
                .value
                .as_array()
                .ok_or_else(|| anyhow!("argument '{key}' must be an array of strings"))?;
            list.iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| anyhow!("argument '{key}' must contain only strings"))
                })
                .collect()
        }
    }
}

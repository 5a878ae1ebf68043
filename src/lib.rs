// src/lib.rs

pub mod cli;
pub mod condition;
pub mod config;
pub mod engine;
pub mod errors;
pub mod event;
pub mod logging;
pub mod pipeline;
pub mod service;
pub mod state;
pub mod task;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::condition::Condition;
use crate::config::loader::{build_pipeline, load_and_validate};
use crate::config::model::ConfigFile;
use crate::engine::{Engine, EngineCore, EngineSignal, RunSummary};
use crate::errors::ReflowError;
use crate::event::{Event, EventKind, FnListener};
use crate::pipeline::Pipeline;
use crate::service::{ServiceDispatcher, ServiceRegistry, ShellService};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and compilation into a pipeline
/// - pipeline validation + engine core
/// - the production service dispatcher (shell backend)
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let pipeline = build_pipeline(&cfg);
    let registry = ServiceRegistry::new().with("shell", Arc::new(ShellService::new()));

    let summary = run_pipeline(pipeline, registry).await?;

    if summary.failed > 0 {
        warn!(
            failed = summary.failed,
            "pipeline finished with failed tasks; steps depending on their success never ran"
        );
    }

    Ok(())
}

/// Run a programmatically built pipeline against the given services.
///
/// This is the library-facing equivalent of [`run`]: validation happens in
/// `EngineCore::new`, and every service a pipeline declares must have a
/// registered backend.
pub async fn run_pipeline(pipeline: Pipeline, services: ServiceRegistry) -> Result<RunSummary> {
    for decl in &pipeline.spec.services {
        if !services.contains(&decl.name) {
            return Err(ReflowError::ConfigError(format!(
                "pipeline declares service '{}' but no backend is registered for it",
                decl.name
            ))
            .into());
        }
    }

    info!(pipeline = %pipeline.name(), "starting pipeline");

    let (signal_tx, signal_rx) = mpsc::channel::<EngineSignal>(64);

    let dispatcher = ServiceDispatcher::new(services, signal_tx.clone());
    let core = EngineCore::new(pipeline)?;

    // Ctrl-C -> graceful shutdown.
    {
        let tx = signal_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(EngineSignal::Shutdown).await;
        });
    }

    let engine = Engine::new(core, signal_rx, signal_tx, dispatcher)
        .with_listener(Box::new(FnListener(log_lifecycle)));
    let summary = engine.run().await?;
    Ok(summary)
}

/// User-facing task lifecycle log, attached as an event listener.
fn log_lifecycle(event: &Event) {
    match &event.kind {
        EventKind::EngineStarted => {}
        EventKind::TaskStarted { task } => info!(task = %task, "task started"),
        EventKind::TaskFinished { task, status } => {
            info!(task = %task, status = %status, "task finished");
        }
    }
}

/// Simple dry-run output: print tasks, dependencies and scripts.
fn print_dry_run(cfg: &ConfigFile) {
    println!("reflow dry-run");
    println!("  pipeline: {}", cfg.pipeline.name);
    println!();

    println!("tasks ({}):", cfg.task.len());
    for (name, task) in cfg.task.iter() {
        println!("  - {name}  [{} / {}]", task.service, task.endpoint);
        for cmd in &task.commands {
            println!("      cmd: {cmd}");
        }
        if let Some(ref path) = task.path {
            println!("      path: {path}");
        }
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        if !task.after_any.is_empty() {
            println!("      after_any: {:?}", task.after_any);
        }
        if !task.require_env.is_empty() {
            println!("      require_env: {:?}", task.require_env);
        }
        if let Some(timeout) = task.timeout {
            println!("      timeout: {timeout}s");
        }
    }

    let pipeline = build_pipeline(cfg);
    match crate::pipeline::validate::validate_pipeline(&pipeline) {
        Ok(()) => println!("\npipeline is valid"),
        Err(e) => println!("\npipeline is INVALID: {e}"),
    }

    print_roots(&pipeline);
}

fn print_roots(pipeline: &Pipeline) {
    let roots: Vec<_> = pipeline
        .spec
        .reactions
        .iter()
        .filter(|r| r.condition == Condition::engine_started())
        .flat_map(|r| r.produces.iter())
        .collect();
    println!("roots at engine start: {roots:?}");
}

// src/service/mod.rs

//! Service backends and task dispatch.
//!
//! The engine core has no knowledge of what a task *does*; it forwards the
//! task's endpoint and argument list to the registered [`Service`] whose
//! name matches the task's target. This is the seam external runners plug
//! into (the production backend here runs local shell processes, see
//! [`shell`]).
//!
//! The runtime talks to a [`TaskDispatcher`] instead of services directly.
//! This makes it easy to swap in a fake dispatcher in tests while keeping
//! the production dispatch path in [`ServiceDispatcher`].

pub mod shell;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::engine::EngineSignal;
use crate::errors::Result;
use crate::event::{Event, EventKind};
use crate::task::{Argument, Task, TaskStatus};

pub use shell::ShellService;

/// A pluggable backend executing task endpoints.
///
/// `Ok(())` means the task succeeded; any error is recorded as a `Failed`
/// status (and logged), never propagated to crash the engine.
pub trait Service: Send + Sync {
    fn call(
        &self,
        endpoint: &str,
        arguments: &[Argument],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;
}

/// Name -> backend mapping handed to the production dispatcher.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, Arc<dyn Service>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, service: Arc<dyn Service>) -> Self {
        self.services.insert(name.into(), service);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    fn get(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.services.get(name).cloned()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Trait abstracting how accepted tasks are executed.
///
/// Production code uses [`ServiceDispatcher`]; tests can provide their own
/// implementation that records tasks and synthesizes completion events.
pub trait TaskDispatcher: Send {
    /// Dispatch the given tasks for execution.
    ///
    /// Tasks in one batch run concurrently with each other and with
    /// anything already in flight; any required ordering is expressed via
    /// conditions, never here.
    fn dispatch(
        &mut self,
        tasks: Vec<Task>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production dispatcher: one spawned tokio task per engine task.
///
/// Each spawned task publishes `TaskStarted`, invokes the matching service
/// backend, and publishes `TaskFinished` with the terminal status. A panic
/// inside a backend is captured through the join handle and reported as
/// `Failed`; a task targeting an unregistered service is completed as
/// `Failed` immediately so the run still reaches its fixed point.
pub struct ServiceDispatcher {
    registry: ServiceRegistry,
    signal_tx: mpsc::Sender<EngineSignal>,
}

impl ServiceDispatcher {
    pub fn new(registry: ServiceRegistry, signal_tx: mpsc::Sender<EngineSignal>) -> Self {
        Self {
            registry,
            signal_tx,
        }
    }
}

impl TaskDispatcher for ServiceDispatcher {
    fn dispatch(
        &mut self,
        tasks: Vec<Task>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let registry = self.registry.clone();
        let signal_tx = self.signal_tx.clone();

        Box::pin(async move {
            for task in tasks {
                let service = registry.get(&task.service);
                let tx = signal_tx.clone();
                tokio::spawn(execute_task(task, service, tx));
            }
            Ok(())
        })
    }
}

/// Run one task to a terminal status, publishing lifecycle events.
async fn execute_task(
    task: Task,
    service: Option<Arc<dyn Service>>,
    signal_tx: mpsc::Sender<EngineSignal>,
) {
    let name = task.name.clone();

    let started = Event::now(EventKind::TaskStarted { task: name.clone() });
    if signal_tx.send(EngineSignal::Published(started)).await.is_err() {
        // Engine already gone; nothing to report to.
        return;
    }

    let status = match service {
        None => {
            error!(
                task = %name,
                service = %task.service,
                "task targets an unregistered service; failing it"
            );
            TaskStatus::Failed
        }
        Some(service) => {
            let task = Arc::new(task);
            let call_task = Arc::clone(&task);
            // Run the backend call on its own tokio task so a panic is
            // contained in the join error instead of tearing anything down.
            let handle = tokio::spawn(async move {
                service.call(&call_task.endpoint, &call_task.arguments).await
            });

            match handle.await {
                Ok(Ok(())) => {
                    info!(task = %name, "task finished successfully");
                    TaskStatus::Success
                }
                Ok(Err(err)) => {
                    warn!(task = %name, error = %err, "task failed");
                    TaskStatus::Failed
                }
                Err(join_err) if join_err.is_panic() => {
                    error!(task = %name, "task execution panicked; recording failure");
                    TaskStatus::Failed
                }
                Err(join_err) => {
                    warn!(task = %name, error = %join_err, "task execution cancelled");
                    TaskStatus::Failed
                }
            }
        }
    };

    let finished = Event::now(EventKind::TaskFinished {
        task: name,
        status,
    });
    let _ = signal_tx.send(EngineSignal::Published(finished)).await;
}

// src/engine/runtime.rs

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::errors::Result;
use crate::event::{Event, EventKind, EventListener};
use crate::service::TaskDispatcher;

use super::core::EngineCore;
use super::{CoreCommand, EngineSignal, RunSummary};

/// Drives the engine core in response to published events, and delegates
/// task execution to a [`TaskDispatcher`].
///
/// This is a pure IO shell around [`EngineCore`], which contains all the
/// run semantics. Event delivery is serialized: this loop is the single
/// consumer of the signal channel and the single writer of the state
/// store, so no two events are ever processed at the same instant, while
/// task execution itself runs concurrently off the critical path.
pub struct Engine<D: TaskDispatcher> {
    core: EngineCore,
    signal_rx: mpsc::Receiver<EngineSignal>,
    signal_tx: mpsc::Sender<EngineSignal>,
    dispatcher: D,
    listeners: Vec<Box<dyn EventListener>>,
}

impl<D: TaskDispatcher> fmt::Debug for Engine<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<D: TaskDispatcher> Engine<D> {
    pub fn new(
        core: EngineCore,
        signal_rx: mpsc::Receiver<EngineSignal>,
        signal_tx: mpsc::Sender<EngineSignal>,
        dispatcher: D,
    ) -> Self {
        Self {
            core,
            signal_rx,
            signal_tx,
            dispatcher,
            listeners: Vec::new(),
        }
    }

    /// Register a read-only event observer. Listeners are notified in
    /// registration order, before the matcher evaluates each event.
    pub fn with_listener(mut self, listener: Box<dyn EventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Main event loop.
    ///
    /// - Publishes the engine-started event.
    /// - Consumes signals from the channel, one at a time.
    /// - Feeds events into the pure core and executes returned commands.
    /// - Stops at the fixed point (core reports nothing left in flight),
    ///   on a shutdown signal, or on an engine-fatal error.
    pub async fn run(mut self) -> Result<RunSummary> {
        info!("engine starting");

        self.signal_tx
            .send(EngineSignal::Published(Event::now(EventKind::EngineStarted)))
            .await
            .map_err(anyhow::Error::from)?;

        loop {
            let signal = match self.signal_rx.recv().await {
                Some(s) => s,
                None => {
                    info!("engine signal channel closed; exiting");
                    break;
                }
            };

            let event = match signal {
                EngineSignal::Shutdown => {
                    info!("shutdown requested; stopping engine");
                    break;
                }
                EngineSignal::Published(event) => event,
            };

            debug!(?event, "engine received event");
            self.notify_listeners(&event);

            // Feed the event into the pure core; errors here are fatal.
            let step = self.core.step(&event)?;

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("run reached its fixed point; stopping engine");
                break;
            }
        }

        let summary = self.core.summary();
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "engine finished"
        );
        Ok(summary)
    }

    /// Fan an event out to registered listeners, isolating panics so a
    /// broken observer cannot crash the run.
    fn notify_listeners(&mut self, event: &Event) {
        for listener in self.listeners.iter_mut() {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                let msg = if let Some(s) = panic.downcast_ref::<&str>() {
                    (*s).to_string()
                } else {
                    "<non-string panic payload>".to_string()
                };
                error!(panic = %msg, "event listener panicked; continuing");
            }
        }
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchTasks(tasks) => {
                let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
                debug!(?names, "dispatching tasks");
                self.dispatcher.dispatch(tasks).await?;
            }
        }
        Ok(())
    }
}

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use reflow::engine::EngineSignal;
use reflow::errors::Result;
use reflow::event::{Event, EventKind};
use reflow::service::TaskDispatcher;
use reflow::task::{Task, TaskStatus};

/// A fake dispatcher that:
/// - records dispatched tasks, batch by batch
/// - immediately publishes TaskStarted + TaskFinished for each task,
///   with a per-task outcome (default Success).
pub struct FakeDispatcher {
    signal_tx: mpsc::Sender<EngineSignal>,
    batches: Arc<Mutex<Vec<Vec<String>>>>,
    outcomes: HashMap<String, TaskStatus>,
}

impl FakeDispatcher {
    pub fn new(
        signal_tx: mpsc::Sender<EngineSignal>,
        batches: Arc<Mutex<Vec<Vec<String>>>>,
    ) -> Self {
        Self {
            signal_tx,
            batches,
            outcomes: HashMap::new(),
        }
    }

    /// Make the named task finish with the given status instead of Success.
    pub fn with_outcome(mut self, task: &str, status: TaskStatus) -> Self {
        self.outcomes.insert(task.to_string(), status);
        self
    }

    pub fn failing(self, task: &str) -> Self {
        self.with_outcome(task, TaskStatus::Failed)
    }
}

impl TaskDispatcher for FakeDispatcher {
    fn dispatch(
        &mut self,
        tasks: Vec<Task>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.signal_tx.clone();
        let batches = Arc::clone(&self.batches);
        let outcomes = self.outcomes.clone();

        Box::pin(async move {
            {
                let mut guard = batches.lock().unwrap();
                guard.push(tasks.iter().map(|t| t.name.clone()).collect());
            }

            for task in tasks {
                tx.send(EngineSignal::Published(Event::now(EventKind::TaskStarted {
                    task: task.name.clone(),
                })))
                .await
                .map_err(anyhow::Error::from)?;

                let status = outcomes
                    .get(&task.name)
                    .copied()
                    .unwrap_or(TaskStatus::Success);
                tx.send(EngineSignal::Published(Event::now(EventKind::TaskFinished {
                    task: task.name.clone(),
                    status,
                })))
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}

/// Flatten recorded batches into a single execution order.
pub fn flatten(batches: &Arc<Mutex<Vec<Vec<String>>>>) -> Vec<String> {
    batches.lock().unwrap().iter().flatten().cloned().collect()
}

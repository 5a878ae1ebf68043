// tests/engine_dedup.rs

//! Redelivery tolerance: the engine's internal delivery is at-least-once,
//! so the state store must absorb duplicate events without scheduling
//! duplicate downstream tasks or terminating the run early.

mod common;
use crate::common::init_tracing;

use std::error::Error;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};

use reflow::engine::{Engine, EngineCore, EngineSignal};
use reflow::errors::Result as ReflowResult;
use reflow::event::{Event, EventKind};
use reflow::service::TaskDispatcher;
use reflow::task::{Task, TaskStatus};
use reflow_test_utils::builders::PipelineBuilder;

type TestResult = Result<(), Box<dyn Error>>;

/// Dispatcher that publishes every lifecycle event twice.
struct DuplicatingDispatcher {
    signal_tx: mpsc::Sender<EngineSignal>,
    batches: Arc<Mutex<Vec<Vec<String>>>>,
}

impl TaskDispatcher for DuplicatingDispatcher {
    fn dispatch(
        &mut self,
        tasks: Vec<Task>,
    ) -> Pin<Box<dyn Future<Output = ReflowResult<()>> + Send + '_>> {
        let tx = self.signal_tx.clone();
        let batches = Arc::clone(&self.batches);

        Box::pin(async move {
            batches
                .lock()
                .unwrap()
                .push(tasks.iter().map(|t| t.name.clone()).collect());

            for task in tasks {
                for _ in 0..2 {
                    tx.send(EngineSignal::Published(Event::now(EventKind::TaskStarted {
                        task: task.name.clone(),
                    })))
                    .await
                    .map_err(anyhow::Error::from)?;
                }
                for _ in 0..2 {
                    tx.send(EngineSignal::Published(Event::now(EventKind::TaskFinished {
                        task: task.name.clone(),
                        status: TaskStatus::Success,
                    })))
                    .await
                    .map_err(anyhow::Error::from)?;
                }
            }
            Ok(())
        })
    }
}

#[tokio::test]
async fn duplicate_events_do_not_double_schedule_or_end_the_run_early() -> TestResult {
    init_tracing();

    let pipeline = PipelineBuilder::new("dedup")
        .with_root("a")
        .with_step("b", &["a"])
        .with_step("c", &["b"])
        .build();

    let batches = Arc::new(Mutex::new(Vec::new()));
    let (signal_tx, signal_rx) = mpsc::channel::<EngineSignal>(32);
    let dispatcher = DuplicatingDispatcher {
        signal_tx: signal_tx.clone(),
        batches: Arc::clone(&batches),
    };

    let core = EngineCore::new(pipeline)?;
    let engine = Engine::new(core, signal_rx, signal_tx, dispatcher);

    let summary = timeout(Duration::from_secs(3), engine.run())
        .await
        .expect("engine did not finish within 3 seconds")?;

    // Each task dispatched exactly once despite every event arriving twice.
    let got = batches.lock().unwrap().clone();
    assert_eq!(
        got,
        vec![
            vec!["a".to_string()],
            vec!["b".to_string()],
            vec!["c".to_string()],
        ]
    );

    // The duplicate finish for "c" must not decrement the in-flight count
    // below zero or otherwise corrupt the summary.
    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 0);
    Ok(())
}

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use tokio::sync::{Mutex, OwnedSemaphorePermit, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::IngestError;
use crate::runtime::flow_control::{FlowControlConfig, FlowController};
use crate::runtime::{DynCommitSink, DynRuntimeMetrics};
use crate::types::{QueueConfig, QueueStats, Task, TaskId};

struct Queued<R> {
    id: TaskId,
    task: Task<R>,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    completed: AtomicU64,
    commit_failures: AtomicU64,
    in_flight: AtomicUsize,
    queued: AtomicUsize,
}

struct QueueShared<R> {
    sink: DynCommitSink<R>,
    metrics: DynRuntimeMetrics,
    counters: Counters,
    // queued + in flight; watched by `wait_idle`
    outstanding: watch::Sender<usize>,
}

impl<R> QueueShared<R> {
    fn abandon(&self, id: TaskId) {
        self.counters.queued.fetch_sub(1, Ordering::SeqCst);
        self.outstanding.send_modify(|n| *n = n.saturating_sub(1));
        debug!(task_id = id, "dropping queued task on shutdown");
    }
}

/// Releases the concurrency slot and the outstanding count, also when the task panics.
struct InFlightGuard<R> {
    shared: Arc<QueueShared<R>>,
    permit: Option<OwnedSemaphorePermit>,
}

impl<R> Drop for InFlightGuard<R> {
    fn drop(&mut self) {
        drop(self.permit.take());
        let in_flight = self.shared.counters.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        self.shared.metrics.observe_in_flight(in_flight);
        self.shared.outstanding.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// FIFO task queue with a fixed number of concurrency slots.
///
/// Tasks are admitted in `enqueue` order by a single dispatcher, each one waiting for a free
/// slot before it is spawned. Finished outputs go to the [`CommitSink`](crate::CommitSink) in
/// completion order. Nothing is retried and nothing in flight is ever cancelled.
pub struct TaskQueue<R> {
    tx: mpsc::UnboundedSender<Queued<R>>,
    shared: Arc<QueueShared<R>>,
    flow: FlowController,
    max_pending: Option<usize>,
    next_id: AtomicU64,
    cancel: CancellationToken,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl<R> TaskQueue<R>
where
    R: Send + 'static,
{
    /// Spawns the dispatcher on the current tokio runtime.
    pub fn start(
        config: &QueueConfig,
        sink: DynCommitSink<R>,
        metrics: DynRuntimeMetrics,
    ) -> Result<Self, IngestError> {
        if config.concurrency == 0 {
            return Err(IngestError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| IngestError::Execution(format!("no tokio runtime: {e}")))?;

        let flow = FlowController::new(&FlowControlConfig::from(config));
        let (tx, rx) = mpsc::unbounded_channel();
        let (outstanding, _) = watch::channel(0usize);
        let shared = Arc::new(QueueShared {
            sink,
            metrics,
            counters: Counters::default(),
            outstanding,
        });
        let cancel = CancellationToken::new();

        let dispatcher = runtime.spawn(dispatch(
            rx,
            flow.clone(),
            Arc::clone(&shared),
            cancel.clone(),
        ));

        Ok(Self {
            tx,
            shared,
            flow,
            max_pending: config.max_pending,
            next_id: AtomicU64::new(0),
            cancel,
            dispatcher: Mutex::new(Some(dispatcher)),
        })
    }

    /// Appends a task to the FIFO. Never blocks.
    pub fn enqueue(&self, task: Task<R>) -> Result<TaskId, IngestError> {
        if self.cancel.is_cancelled() {
            return Err(IngestError::Closed("task queue shut down".to_string()));
        }

        let max_pending = self.max_pending;
        let queued = self
            .shared
            .counters
            .queued
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |q| match max_pending {
                Some(max) if q >= max => None,
                _ => Some(q + 1),
            })
            .map_err(|q| IngestError::Execution(format!("pending queue full ({q} waiting)")))?
            + 1;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.shared.outstanding.send_modify(|n| *n += 1);

        if self.tx.send(Queued { id, task }).is_err() {
            self.shared.counters.queued.fetch_sub(1, Ordering::SeqCst);
            self.shared
                .outstanding
                .send_modify(|n| *n = n.saturating_sub(1));
            return Err(IngestError::Closed("task dispatcher stopped".to_string()));
        }

        self.shared.counters.enqueued.fetch_add(1, Ordering::SeqCst);
        self.shared.metrics.observe_queue_depth(queued);
        trace!(task_id = id, queued, "task enqueued");
        Ok(id)
    }

    pub fn concurrency(&self) -> usize {
        self.flow.max_in_flight()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// How many more tasks `enqueue` accepts right now. `None` when the FIFO is unbounded.
    pub fn remaining_capacity(&self) -> Option<usize> {
        self.max_pending.map(|max| {
            max.saturating_sub(self.shared.counters.queued.load(Ordering::SeqCst))
        })
    }

    pub fn stats(&self) -> QueueStats {
        let c = &self.shared.counters;
        QueueStats {
            enqueued: c.enqueued.load(Ordering::SeqCst),
            completed: c.completed.load(Ordering::SeqCst),
            commit_failures: c.commit_failures.load(Ordering::SeqCst),
            in_flight: c.in_flight.load(Ordering::SeqCst),
            queued: c.queued.load(Ordering::SeqCst),
        }
    }

    /// Resolves once nothing is queued or running.
    pub async fn wait_idle(&self) {
        let mut rx = self.shared.outstanding.subscribe();
        // the sender lives in `self.shared`, so the channel cannot close while we wait
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Stops admission, drops tasks that have not started and waits for running ones.
    pub async fn shutdown(&self) -> Result<(), IngestError> {
        self.cancel.cancel();
        let handle = self.dispatcher.lock().await.take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| IngestError::Execution(format!("dispatcher join failure: {e}")))?;
        }
        self.wait_idle().await;
        Ok(())
    }
}

impl<R> Drop for TaskQueue<R> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn dispatch<R>(
    mut rx: mpsc::UnboundedReceiver<Queued<R>>,
    flow: FlowController,
    shared: Arc<QueueShared<R>>,
    cancel: CancellationToken,
) where
    R: Send + 'static,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = rx.recv() => next,
        };
        let Some(queued) = next else {
            break;
        };

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                shared.abandon(queued.id);
                break;
            }
            permit = flow.acquire_in_flight() => match permit {
                Ok(permit) => permit,
                Err(e) => {
                    warn!("task dispatcher stopping: {e}");
                    shared.abandon(queued.id);
                    break;
                }
            },
        };

        shared.counters.queued.fetch_sub(1, Ordering::SeqCst);
        let in_flight = shared.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        shared.metrics.observe_in_flight(in_flight);
        trace!(task_id = queued.id, in_flight, "task admitted");

        let guard = InFlightGuard {
            shared: Arc::clone(&shared),
            permit: Some(permit),
        };
        tokio::spawn(run_task(queued, guard));
    }

    rx.close();
    while let Ok(queued) = rx.try_recv() {
        shared.abandon(queued.id);
    }
    flow.close();
}

async fn run_task<R>(queued: Queued<R>, guard: InFlightGuard<R>)
where
    R: Send + 'static,
{
    let started = Instant::now();
    let output = queued.task.await;
    let shared = &guard.shared;
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    shared.metrics.observe_task_latency_ms(latency_ms);

    match shared.sink.commit(output) {
        Ok(()) => shared.metrics.observe_commit(true),
        Err(e) => {
            shared.counters.commit_failures.fetch_add(1, Ordering::SeqCst);
            shared.metrics.observe_commit(false);
            warn!(task_id = queued.id, "commit failed: {e}");
        }
    }
    shared.counters.completed.fetch_add(1, Ordering::SeqCst);
    drop(guard);
}

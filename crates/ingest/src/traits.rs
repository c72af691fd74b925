use crate::error::IngestError;

/// Receives the output of every finished task, in completion order.
///
/// Called from the task that produced the result, before its concurrency slot is released.
pub trait CommitSink<R>: Send + Sync {
    fn commit(&self, result: R) -> Result<(), IngestError>;
}

pub trait RuntimeMetrics: Send + Sync {
    fn observe_queue_depth(&self, depth: usize);
    fn observe_in_flight(&self, in_flight: usize);
    fn observe_task_latency_ms(&self, latency_ms: u64);
    fn observe_commit(&self, ok: bool);
}

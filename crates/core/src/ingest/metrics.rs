use searchdex_ingest::RuntimeMetrics;

pub struct NoopRuntimeMetrics;

impl RuntimeMetrics for NoopRuntimeMetrics {
    fn observe_queue_depth(&self, _depth: usize) {}

    fn observe_in_flight(&self, _in_flight: usize) {}

    fn observe_task_latency_ms(&self, _latency_ms: u64) {}

    fn observe_commit(&self, _ok: bool) {}
}

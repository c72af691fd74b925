use futures::future::BoxFuture;

pub type TaskId = u64;

/// A unit of work admitted by the queue. The output is handed to the commit sink as-is.
pub type Task<R> = BoxFuture<'static, R>;

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of tasks running at once.
    pub concurrency: usize,
    /// Upper bound on tasks waiting for a slot. `None` keeps the FIFO unbounded.
    pub max_pending: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            max_pending: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: u64,
    pub completed: u64,
    pub commit_failures: u64,
    pub in_flight: usize,
    pub queued: usize,
}

pub mod error;
pub mod runtime;
pub mod traits;
pub mod types;

pub use error::IngestError;
pub use runtime::{DynCommitSink, DynRuntimeMetrics, FlowControlConfig, TaskQueue};
pub use traits::{CommitSink, RuntimeMetrics};
pub use types::{QueueConfig, QueueStats, Task, TaskId};

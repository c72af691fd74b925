use std::sync::Arc;

use crate::traits::{CommitSink, RuntimeMetrics};

pub mod flow_control;
pub mod queue;

pub use flow_control::{FlowControlConfig, FlowController};
pub use queue::TaskQueue;

pub type DynCommitSink<R> = Arc<dyn CommitSink<R> + Send + Sync>;
pub type DynRuntimeMetrics = Arc<dyn RuntimeMetrics + Send + Sync>;

pub mod commit_sink;
pub mod metrics;

pub use commit_sink::StoreCommitSink;
pub use metrics::NoopRuntimeMetrics;

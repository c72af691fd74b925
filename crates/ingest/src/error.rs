use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("execution failed: {0}")]
    Execution(String),
    #[error("queue closed: {0}")]
    Closed(String),
    #[error("commit failed: {0}")]
    Commit(String),
    #[error("invalid queue config: {0}")]
    InvalidConfig(String),
}

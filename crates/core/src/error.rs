use searchdex_ingest::IngestError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchdexError {
    #[error("duplicate key {key:?} at positions {first} and {second}")]
    DuplicateKey {
        key: String,
        first: usize,
        second: usize,
    },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Task queue error: {0}")]
    Ingest(#[from] IngestError),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a single item could not be turned into an index string.
///
/// Recorded on the entry as [`IndexState::Failed`](crate::model::IndexState::Failed) rather than
/// returned to the caller of `update`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("extraction failed: {0}")]
    Failed(String),
    #[error("extractor panicked: {0}")]
    Panicked(String),
    #[error("item could not be serialized: {0}")]
    Serialize(String),
}

pub type Result<T> = std::result::Result<T, SearchdexError>;

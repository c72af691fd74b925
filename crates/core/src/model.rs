use std::sync::Arc;

use serde::Serialize;

use crate::error::ExtractionError;

pub type Key = String;

/// Indexing progress of one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum IndexState {
    /// Known, extraction not finished yet.
    Pending,
    /// Extracted fields joined into the search surrogate.
    Indexed(String),
    /// Extraction failed; never retried.
    Failed(String),
}

impl IndexState {
    pub fn is_pending(&self) -> bool {
        matches!(self, IndexState::Pending)
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self, IndexState::Indexed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, IndexState::Failed(_))
    }
}

#[derive(Debug)]
pub struct IndexEntry<T> {
    pub state: IndexState,
    pub data: Arc<T>,
    /// Snapshot generation in which the key was last present.
    pub seen: u64,
}

impl<T> Clone for IndexEntry<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            data: Arc::clone(&self.data),
            seen: self.seen,
        }
    }
}

impl<T> IndexEntry<T> {
    pub fn pending(data: Arc<T>, seen: u64) -> Self {
        Self {
            state: IndexState::Pending,
            data,
            seen,
        }
    }

    /// The search surrogate, once computed.
    pub fn index(&self) -> Option<&str> {
        match &self.state {
            IndexState::Indexed(index) => Some(index),
            _ => None,
        }
    }
}

/// An item that needs its fields extracted.
#[derive(Debug)]
pub struct WorkItem<T> {
    pub key: Key,
    pub data: Arc<T>,
}

impl<T> Clone for WorkItem<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            data: Arc::clone(&self.data),
        }
    }
}

/// Single-key result of one extraction task.
///
/// `data` is the item the task was created with, not whatever the latest snapshot holds.
#[derive(Debug)]
pub struct Completion<T> {
    pub key: Key,
    pub data: Arc<T>,
    pub outcome: Result<String, ExtractionError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    Indexed { key: Key },
    Failed { key: Key, reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub total: usize,
    pub pending: usize,
    pub indexed: usize,
    pub failed: usize,
    pub in_flight: usize,
    pub queued: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub generation: u64,
    pub snapshot_len: usize,
    pub enqueued: usize,
    pub duplicates: Vec<Key>,
    pub evicted: Vec<Key>,
}

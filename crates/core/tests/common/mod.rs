#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use searchdex_core::{IndexStore, SearchIndexer};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Doc {
    pub id: u32,
    pub text: String,
}

impl Doc {
    pub fn new(id: u32, text: &str) -> Self {
        Self {
            id,
            text: text.to_string(),
        }
    }
}

pub fn doc_key(doc: &Doc, _position: usize) -> String {
    format!("KEY-{}", doc.id)
}

/// Ids passed to an extractor, in call order.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<u32>>>);

impl CallLog {
    pub fn record(&self, id: u32) {
        self.0.lock().expect("lock poisoned").push(id);
    }

    pub fn calls(&self) -> Vec<u32> {
        self.0.lock().expect("lock poisoned").clone()
    }
}

pub async fn settle<T>(indexer: &SearchIndexer<T>)
where
    T: Send + Sync + 'static,
{
    tokio::time::timeout(Duration::from_secs(5), indexer.wait_idle())
        .await
        .expect("indexer should go idle");
}

pub fn index_of<T>(store: &IndexStore<T>, key: &str) -> Option<String> {
    store
        .get(key)
        .and_then(|entry| entry.index())
        .map(str::to_string)
}

pub fn keys_of<T>(store: &IndexStore<T>) -> Vec<String> {
    store.keys().cloned().collect()
}

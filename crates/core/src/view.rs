use std::sync::{Arc, Mutex, PoisonError};

use crate::model::IndexEntry;
use crate::store::IndexStore;

/// Entries with a computed index, in store order.
pub fn indexed_entries<T>(store: &IndexStore<T>) -> Vec<IndexEntry<T>> {
    store
        .iter()
        .filter(|(_, entry)| entry.index().is_some())
        .map(|(_, entry)| entry.clone())
        .collect()
}

/// Substring containment over the index string. An empty term matches every entry.
pub fn search<T>(entries: &[IndexEntry<T>], term: &str) -> Vec<IndexEntry<T>> {
    entries
        .iter()
        .filter(|entry| entry.index().is_some_and(|index| index.contains(term)))
        .cloned()
        .collect()
}

/// `indexed_entries`, recomputed only when the store version changes.
pub struct DerivedView<T> {
    cached: Mutex<Option<(u64, Arc<[IndexEntry<T>]>)>>,
}

impl<T> Default for DerivedView<T> {
    fn default() -> Self {
        Self {
            cached: Mutex::new(None),
        }
    }
}

impl<T> DerivedView<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, store: &IndexStore<T>) -> Arc<[IndexEntry<T>]> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((version, view)) = cached.as_ref() {
            if *version == store.version() {
                return Arc::clone(view);
            }
        }

        let view: Arc<[IndexEntry<T>]> = indexed_entries(store).into();
        *cached = Some((store.version(), Arc::clone(&view)));
        view
    }
}

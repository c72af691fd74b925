//! Turns a collection snapshot into placeholder updates and extraction work.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::config::DuplicateKeyPolicy;
use crate::error::{Result, SearchdexError};
use crate::model::{Key, WorkItem};
use crate::store::IndexStore;

/// Derives the identity key of an item from the item and its position in the snapshot.
///
/// Must be deterministic for a given item across snapshots, otherwise already indexed items
/// are extracted again under their new key.
pub type KeyFn<T> = Arc<dyn Fn(&T, usize) -> Key + Send + Sync>;

/// Keys items by their position in the snapshot.
pub fn positional_key<T: 'static>() -> KeyFn<T> {
    Arc::new(|_: &T, position: usize| position.to_string())
}

/// A snapshot with every item keyed, before it is compared against the store.
#[derive(Debug)]
pub struct KeyedSnapshot<T> {
    /// One placeholder per distinct key; the last item with that key wins.
    pub placeholders: IndexMap<Key, Arc<T>>,
    /// The first item of every distinct key, in snapshot order.
    pub first_seen: Vec<WorkItem<T>>,
    /// Keys produced by more than one item of the snapshot.
    pub duplicates: Vec<Key>,
}

#[derive(Debug)]
pub struct Reconciliation<T> {
    pub placeholders: IndexMap<Key, Arc<T>>,
    /// Keys the store has never seen, carrying the first item with that key.
    pub new_work: Vec<WorkItem<T>>,
    pub duplicates: Vec<Key>,
}

/// Runs the key function over a snapshot. Touches no store, so caller code never runs while the
/// store is being written.
pub fn key_items<T>(
    items: &[Arc<T>],
    key_fn: &KeyFn<T>,
    policy: DuplicateKeyPolicy,
) -> Result<KeyedSnapshot<T>> {
    let mut placeholders: IndexMap<Key, Arc<T>> = IndexMap::with_capacity(items.len());
    let mut first_position: HashMap<Key, usize> = HashMap::with_capacity(items.len());
    let mut first_seen = Vec::new();
    let mut duplicates = Vec::new();

    for (position, item) in items.iter().enumerate() {
        let key = key_fn(item.as_ref(), position);

        match first_position.entry(key.clone()) {
            Entry::Occupied(first) => {
                if policy == DuplicateKeyPolicy::Reject {
                    return Err(SearchdexError::DuplicateKey {
                        key,
                        first: *first.get(),
                        second: position,
                    });
                }
                if !duplicates.contains(&key) {
                    duplicates.push(key.clone());
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(position);
                first_seen.push(WorkItem {
                    key: key.clone(),
                    data: Arc::clone(item),
                });
            }
        }

        placeholders.insert(key, Arc::clone(item));
    }

    Ok(KeyedSnapshot {
        placeholders,
        first_seen,
        duplicates,
    })
}

/// Keeps as new work only the keys `current` has no entry for, whatever its state.
pub fn reconcile<T>(snapshot: KeyedSnapshot<T>, current: &IndexStore<T>) -> Reconciliation<T> {
    let KeyedSnapshot {
        placeholders,
        first_seen,
        duplicates,
    } = snapshot;
    let new_work = first_seen
        .into_iter()
        .filter(|work| !current.contains_key(&work.key))
        .collect();

    Reconciliation {
        placeholders,
        new_work,
        duplicates,
    }
}

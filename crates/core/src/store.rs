use std::sync::Arc;

use indexmap::IndexMap;

use crate::config::RetentionPolicy;
use crate::model::{IndexEntry, IndexState, Key};

/// Versioned, immutable view of every key the engine knows about.
///
/// Cloning is cheap (the entry map is shared). The engine is the only writer; every write bumps
/// `version`, and every committed snapshot bumps `generation`.
#[derive(Debug)]
pub struct IndexStore<T> {
    version: u64,
    generation: u64,
    entries: Arc<IndexMap<Key, IndexEntry<T>>>,
}

impl<T> Clone for IndexStore<T> {
    fn clone(&self) -> Self {
        Self {
            version: self.version,
            generation: self.generation,
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<T> Default for IndexStore<T> {
    fn default() -> Self {
        Self {
            version: 0,
            generation: 0,
            entries: Arc::new(IndexMap::new()),
        }
    }
}

impl<T> IndexStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&IndexEntry<T>> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &IndexEntry<T>)> {
        self.entries.iter()
    }

    /// Keys that were not part of the latest snapshot.
    pub fn stale_keys(&self) -> impl Iterator<Item = &Key> {
        let generation = self.generation;
        self.entries
            .iter()
            .filter(move |(_, entry)| entry.seen < generation)
            .map(|(key, _)| key)
    }

    /// `(pending, indexed, failed)`
    pub fn counts(&self) -> (usize, usize, usize) {
        self.entries
            .values()
            .fold((0, 0, 0), |(p, i, f), entry| match entry.state {
                IndexState::Pending => (p + 1, i, f),
                IndexState::Indexed(_) => (p, i + 1, f),
                IndexState::Failed(_) => (p, i, f + 1),
            })
    }

    /// Commits one snapshot's placeholders.
    ///
    /// The result is `placeholders ∪ existing`, where an existing entry wins on key collision and
    /// keeps both its state and its data. Order: snapshot keys first (in snapshot order), then
    /// keys only the previous store had. Returns the keys evicted by `retention`.
    pub(crate) fn merge_placeholders(
        &mut self,
        placeholders: IndexMap<Key, Arc<T>>,
        retention: RetentionPolicy,
    ) -> Vec<Key> {
        let generation = self.generation + 1;
        let mut merged: IndexMap<Key, IndexEntry<T>> =
            IndexMap::with_capacity(placeholders.len() + self.entries.len());

        for (key, data) in placeholders {
            merged.insert(key, IndexEntry::pending(data, generation));
        }
        for (key, entry) in self.entries.iter() {
            match merged.get_mut(key) {
                Some(slot) => {
                    *slot = IndexEntry {
                        state: entry.state.clone(),
                        data: Arc::clone(&entry.data),
                        seen: generation,
                    };
                }
                None => {
                    merged.insert(key.clone(), entry.clone());
                }
            }
        }

        let evicted = match retention {
            RetentionPolicy::RetainAll => Vec::new(),
            RetentionPolicy::Bounded { max_stale } => evict_stale(&mut merged, generation, max_stale),
        };

        self.entries = Arc::new(merged);
        self.generation = generation;
        self.version += 1;
        evicted
    }

    /// Shallow single-key merge of a finished extraction.
    ///
    /// Unrelated keys are untouched; a second completion for the same key overwrites the first.
    /// Returns `false` (and changes nothing) when the key is no longer in the store.
    pub(crate) fn apply_completion(&mut self, key: Key, state: IndexState, data: Arc<T>) -> bool {
        let Some(seen) = self.entries.get(&key).map(|entry| entry.seen) else {
            return false;
        };
        Arc::make_mut(&mut self.entries).insert(key, IndexEntry { state, data, seen });
        self.version += 1;
        true
    }
}

fn evict_stale<T>(
    entries: &mut IndexMap<Key, IndexEntry<T>>,
    generation: u64,
    max_stale: usize,
) -> Vec<Key> {
    let mut stale: Vec<(u64, usize)> = entries
        .values()
        .enumerate()
        .filter(|(_, entry)| entry.seen < generation)
        .map(|(position, entry)| (entry.seen, position))
        .collect();
    if stale.len() <= max_stale {
        return Vec::new();
    }

    // oldest generation first, store order breaks ties
    stale.sort_unstable();
    let excess = stale.len() - max_stale;
    let mut doomed: Vec<usize> = stale[..excess].iter().map(|(_, position)| *position).collect();
    doomed.sort_unstable();

    let mut evicted = Vec::with_capacity(excess);
    // remove back to front so earlier positions stay valid
    for position in doomed.into_iter().rev() {
        if let Some((key, _)) = entries.shift_remove_index(position) {
            evicted.push(key);
        }
    }
    evicted.reverse();
    evicted
}

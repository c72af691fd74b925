use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use searchdex_ingest::{DynRuntimeMetrics, IngestError, QueueConfig, Task, TaskQueue};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::config::IndexerConfig;
use crate::error::{ExtractionError, Result, SearchdexError};
use crate::extract::{DynFieldExtractor, join_fields};
use crate::ingest::StoreCommitSink;
use crate::model::{Completion, IndexEntry, IndexEvent, IndexStats, UpdateReport, WorkItem};
use crate::reconcile::{KeyFn, Reconciliation, key_items, reconcile};
use crate::runtime::IndexerBuilder;
use crate::store::IndexStore;
use crate::view::{self, DerivedView};

/// Incremental search indexer over a changing collection of items.
///
/// Each call to [`update`](Self::update) hands over a full snapshot of the collection:
/// - every item shows up in the store at once, as a pending placeholder
/// - items with a key never seen before get one extraction task on the bounded queue
/// - finished extractions are merged into the store one key at a time
///
/// The store lives in a `watch` channel; its sender is the only write path, so reconciliation
/// and completion merges never interleave.
pub struct SearchIndexer<T> {
    /// Identity of an item across snapshots
    key_fn: KeyFn<T>,

    /// Produces the searchable fields of an item
    extractor: DynFieldExtractor<T>,

    config: IndexerConfig,

    /// Current store version, shared with the commit sink
    store: Arc<watch::Sender<IndexStore<T>>>,

    /// Per-key completion notifications
    events: broadcast::Sender<IndexEvent>,

    /// Memoized indexed-only projection
    view: DerivedView<T>,

    /// Bounded extraction queue
    queue: TaskQueue<Completion<T>>,
}

impl<T> SearchIndexer<T>
where
    T: Send + Sync + 'static,
{
    pub fn builder() -> IndexerBuilder<T> {
        IndexerBuilder::new()
    }

    pub(crate) fn start(
        key_fn: KeyFn<T>,
        extractor: DynFieldExtractor<T>,
        config: IndexerConfig,
        metrics: DynRuntimeMetrics,
    ) -> Result<Self> {
        config.validate()?;

        let (store_tx, _) = watch::channel(IndexStore::new());
        let store = Arc::new(store_tx);
        let (events, _) = broadcast::channel(config.event_capacity);
        let sink = Arc::new(StoreCommitSink {
            store: Arc::clone(&store),
            events: events.clone(),
        });
        let queue = TaskQueue::start(&QueueConfig::from(&config), sink, metrics)?;

        info!(
            concurrency = config.concurrency,
            duplicate_keys = ?config.duplicate_keys,
            retention = ?config.retention,
            "search indexer started"
        );

        Ok(Self {
            key_fn,
            extractor,
            config,
            store,
            events,
            view: DerivedView::new(),
            queue,
        })
    }

    /// Reconciles a new snapshot of the collection.
    ///
    /// Placeholders are committed before any extraction task is enqueued, so on return the store
    /// already holds every key of the snapshot. Keys already in the store keep their entry as is.
    pub fn update<I>(&self, items: I) -> Result<UpdateReport>
    where
        I: IntoIterator,
        I::Item: Into<Arc<T>>,
    {
        let items: Vec<Arc<T>> = items.into_iter().map(Into::into).collect();
        if items.is_empty() {
            debug!("empty snapshot, store unchanged");
            return Ok(UpdateReport {
                generation: self.store.borrow().generation(),
                ..UpdateReport::default()
            });
        }

        // The key function runs before the store is locked. Admission is checked before the
        // store changes, and tasks are enqueued while it is still locked, so a rejected snapshot
        // leaves no orphaned placeholder behind.
        let keyed = key_items(&items, &self.key_fn, self.config.duplicate_keys)?;
        let mut committed = None;
        self.store.send_if_modified(|store| {
            let outcome = self.admit(reconcile(keyed, store));
            match outcome {
                Ok(Reconciliation {
                    placeholders,
                    new_work,
                    duplicates,
                }) => {
                    let evicted = store.merge_placeholders(placeholders, self.config.retention);
                    let enqueued = self.enqueue_all(new_work);
                    committed = Some(Ok((store.generation(), enqueued, duplicates, evicted)));
                    true
                }
                Err(e) => {
                    committed = Some(Err(e));
                    false
                }
            }
        });
        let (generation, enqueued, duplicates, evicted) = committed.ok_or_else(|| {
            SearchdexError::Internal("snapshot was not reconciled".to_string())
        })??;

        debug!(
            generation,
            snapshot_len = items.len(),
            enqueued,
            duplicates = duplicates.len(),
            evicted = evicted.len(),
            "snapshot reconciled"
        );

        Ok(UpdateReport {
            generation,
            snapshot_len: items.len(),
            enqueued,
            duplicates,
            evicted,
        })
    }

    fn admit(&self, reconciliation: Reconciliation<T>) -> Result<Reconciliation<T>> {
        let wanted = reconciliation.new_work.len();
        if wanted == 0 {
            return Ok(reconciliation);
        }
        if self.queue.is_closed() {
            return Err(IngestError::Closed("indexer shut down".to_string()).into());
        }
        if let Some(room) = self.queue.remaining_capacity() {
            if room < wanted {
                return Err(IngestError::Execution(format!(
                    "pending queue full ({wanted} new keys, room for {room})"
                ))
                .into());
            }
        }
        Ok(reconciliation)
    }

    fn enqueue_all(&self, work: Vec<WorkItem<T>>) -> usize {
        let mut enqueued = 0;
        for item in work {
            let key = item.key.clone();
            match self
                .queue
                .enqueue(extraction_task(Arc::clone(&self.extractor), item))
            {
                Ok(_) => enqueued += 1,
                // only a concurrent shutdown gets here; the placeholder stays pending
                Err(e) => warn!(%key, error = %e, "extraction not scheduled"),
            }
        }
        enqueued
    }

    /// Every known key, pending or not.
    pub fn store(&self) -> IndexStore<T> {
        self.store.borrow().clone()
    }

    /// Entries whose index is ready, in store order.
    pub fn indexed(&self) -> Arc<[IndexEntry<T>]> {
        self.view.get(&self.store())
    }

    /// The full store together with the indexed projection of that same version.
    pub fn view(&self) -> (IndexStore<T>, Arc<[IndexEntry<T>]>) {
        let store = self.store();
        let indexed = self.view.get(&store);
        (store, indexed)
    }

    /// Indexed entries whose index string contains `term`.
    pub fn search(&self, term: &str) -> Vec<IndexEntry<T>> {
        view::search(&self.indexed(), term)
    }

    /// Notified with every new store version.
    pub fn subscribe(&self) -> watch::Receiver<IndexStore<T>> {
        self.store.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<IndexEvent> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> IndexStats {
        let store = self.store.borrow();
        let (pending, indexed, failed) = store.counts();
        let queue = self.queue.stats();
        IndexStats {
            total: store.len(),
            pending,
            indexed,
            failed,
            in_flight: queue.in_flight,
            queued: queue.queued,
        }
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Resolves once every enqueued extraction has been merged.
    pub async fn wait_idle(&self) {
        self.queue.wait_idle().await;
    }

    /// Stops accepting snapshots with new keys and waits for running extractions.
    pub async fn shutdown(&self) -> Result<()> {
        self.queue.shutdown().await?;
        info!("search indexer stopped");
        Ok(())
    }
}

impl<T> SearchIndexer<T>
where
    T: Serialize + Send + Sync + 'static,
{
    /// Positional keys and serialized field values.
    pub fn new(config: IndexerConfig) -> Result<Self> {
        IndexerBuilder::new().serde_fields().config(config).build()
    }
}

fn extraction_task<T>(extractor: DynFieldExtractor<T>, work: WorkItem<T>) -> Task<Completion<T>>
where
    T: Send + Sync + 'static,
{
    async move {
        let WorkItem { key, data } = work;
        let outcome = match AssertUnwindSafe(extractor.extract(&data))
            .catch_unwind()
            .await
        {
            Ok(fields) => fields.map(|fields| join_fields(&fields)),
            Err(panic) => Err(ExtractionError::Panicked(panic_message(panic.as_ref()))),
        };
        Completion { key, data, outcome }
    }
    .boxed()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

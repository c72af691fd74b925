use std::future::Future;
use std::sync::Arc;

use searchdex_ingest::DynRuntimeMetrics;
use serde::Serialize;

use crate::config::IndexerConfig;
use crate::error::{ExtractionError, Result, SearchdexError};
use crate::extract::{self, DynFieldExtractor, FieldExtractor, SerdeFieldsExtractor};
use crate::ingest::NoopRuntimeMetrics;
use crate::model::Key;
use crate::reconcile::{KeyFn, positional_key};
use crate::runtime::SearchIndexer;

pub struct IndexerBuilder<T> {
    key_fn: Option<KeyFn<T>>,
    extractor: Option<DynFieldExtractor<T>>,
    config: IndexerConfig,
    metrics: Option<DynRuntimeMetrics>,
}

impl<T> Default for IndexerBuilder<T> {
    fn default() -> Self {
        Self {
            key_fn: None,
            extractor: None,
            config: IndexerConfig::default(),
            metrics: None,
        }
    }
}

impl<T> IndexerBuilder<T>
where
    T: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity of an item across snapshots. Defaults to the item's position.
    pub fn key_fn<F>(mut self, key_fn: F) -> Self
    where
        F: Fn(&T, usize) -> Key + Send + Sync + 'static,
    {
        self.key_fn = Some(Arc::new(key_fn));
        self
    }

    pub fn extractor<E>(mut self, extractor: E) -> Self
    where
        E: FieldExtractor<T> + 'static,
    {
        self.extractor = Some(Arc::new(extractor));
        self
    }

    pub fn shared_extractor(mut self, extractor: DynFieldExtractor<T>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn extract_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> Vec<String> + Send + Sync + 'static,
    {
        self.extractor = Some(extract::from_fn(f));
        self
    }

    pub fn extract_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Vec<String>, ExtractionError>> + Send + 'static,
    {
        self.extractor = Some(extract::from_async_fn(f));
        self
    }

    pub fn config(mut self, config: IndexerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    pub fn metrics(mut self, metrics: DynRuntimeMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Starts the engine. Must be called inside a tokio runtime.
    pub fn build(self) -> Result<SearchIndexer<T>> {
        let extractor = self.extractor.ok_or_else(|| {
            SearchdexError::Config("no field extractor configured".to_string())
        })?;
        let key_fn = self.key_fn.unwrap_or_else(positional_key);
        let metrics = self
            .metrics
            .unwrap_or_else(|| Arc::new(NoopRuntimeMetrics) as DynRuntimeMetrics);

        SearchIndexer::start(key_fn, extractor, self.config, metrics)
    }
}

impl<T> IndexerBuilder<T>
where
    T: Serialize + Send + Sync + 'static,
{
    /// Index every serialized field value of the item.
    pub fn serde_fields(self) -> Self {
        self.extractor(SerdeFieldsExtractor)
    }
}

pub mod config;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod reconcile;
pub mod runtime;
pub mod store;
pub mod view;

pub use config::{DuplicateKeyPolicy, IndexerConfig, RetentionPolicy};
pub use error::{ExtractionError, Result, SearchdexError};
pub use extract::{FieldExtractor, SerdeFieldsExtractor};
pub use model::{IndexEntry, IndexEvent, IndexState, IndexStats, Key, UpdateReport};
pub use runtime::{IndexerBuilder, SearchIndexer};
pub use store::IndexStore;

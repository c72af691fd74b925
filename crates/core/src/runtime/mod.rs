//! The search indexer engine: reconciliation on the caller's thread, extraction on the task
//! queue, and a single serialized writer for the store.

mod builder;
mod indexer;

pub use builder::IndexerBuilder;
pub use indexer::SearchIndexer;

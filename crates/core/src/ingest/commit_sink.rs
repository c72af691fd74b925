use std::sync::Arc;

use searchdex_ingest::{CommitSink, IngestError};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use crate::model::{Completion, IndexEvent, IndexState};
use crate::store::IndexStore;

/// Merges finished extractions into the shared store and announces them.
pub struct StoreCommitSink<T> {
    pub store: Arc<watch::Sender<IndexStore<T>>>,
    pub events: broadcast::Sender<IndexEvent>,
}

impl<T> CommitSink<Completion<T>> for StoreCommitSink<T>
where
    T: Send + Sync + 'static,
{
    fn commit(&self, completion: Completion<T>) -> Result<(), IngestError> {
        let Completion { key, data, outcome } = completion;

        let (state, event) = match outcome {
            Ok(index) => (
                IndexState::Indexed(index),
                IndexEvent::Indexed { key: key.clone() },
            ),
            Err(e) => {
                warn!(key = %key, "extraction failed: {e}");
                let reason = e.to_string();
                (
                    IndexState::Failed(reason.clone()),
                    IndexEvent::Failed {
                        key: key.clone(),
                        reason,
                    },
                )
            }
        };

        let applied = self
            .store
            .send_if_modified(|store| store.apply_completion(key.clone(), state, data));
        if !applied {
            debug!(key = %key, "dropping completion for evicted key");
            return Ok(());
        }

        // no subscriber is fine
        let _ = self.events.send(event);
        Ok(())
    }
}

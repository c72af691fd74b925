use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::IngestError;
use crate::types::QueueConfig;

#[derive(Debug, Clone)]
pub struct FlowControlConfig {
    pub max_in_flight: usize,
}

impl Default for FlowControlConfig {
    fn default() -> Self {
        Self { max_in_flight: 1 }
    }
}

impl From<&QueueConfig> for FlowControlConfig {
    fn from(value: &QueueConfig) -> Self {
        Self {
            max_in_flight: value.concurrency,
        }
    }
}

/// Hands out one permit per running task.
///
/// `tokio::sync::Semaphore` is fair, and the dispatcher is its only caller, so permits are
/// granted strictly in admission order.
#[derive(Clone)]
pub struct FlowController {
    in_flight: Arc<Semaphore>,
    max_in_flight: usize,
}

impl FlowController {
    pub fn new(config: &FlowControlConfig) -> Self {
        let max_in_flight = config.max_in_flight.max(1);
        Self {
            in_flight: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        }
    }

    pub async fn acquire_in_flight(&self) -> Result<OwnedSemaphorePermit, IngestError> {
        self.in_flight
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| IngestError::Closed("in-flight flow controller closed".to_string()))
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn available(&self) -> usize {
        self.in_flight.available_permits()
    }

    pub fn close(&self) {
        self.in_flight.close();
    }
}

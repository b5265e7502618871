//! Output queues receiving serialized items
//!
//! The job runner only needs one operation from a queue: append a payload
//! to a named queue. Appends coming from one producer keep their order;
//! nothing is guaranteed across producers.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

pub mod jsonl;

pub use jsonl::JsonLinesQueue;

/// Queue errors
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Lock error
    #[error("lock error: {0}")]
    LockError(String),

    /// Payload cannot be stored by this queue
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Append target for serialized items
#[async_trait]
pub trait ItemQueue: Send + Sync {
    /// Append `payload` to the queue named `queue`
    async fn push(&self, queue: &str, payload: Vec<u8>) -> QueueResult<()>;
}

/// Queue keeping every payload in memory
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    queues: Mutex<HashMap<String, Vec<Vec<u8>>>>,
}

impl InMemoryQueue {
    /// Create an empty in-memory queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads pushed to `queue`, in push order
    pub async fn items(&self, queue: &str) -> Vec<Vec<u8>> {
        self.queues
            .lock()
            .await
            .get(queue)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of payloads pushed to `queue`
    pub async fn len(&self, queue: &str) -> usize {
        self.queues.lock().await.get(queue).map_or(0, Vec::len)
    }
}

#[async_trait]
impl ItemQueue for InMemoryQueue {
    async fn push(&self, queue: &str, payload: Vec<u8>) -> QueueResult<()> {
        self.queues
            .lock()
            .await
            .entry(queue.to_string())
            .or_default()
            .push(payload);
        Ok(())
    }
}

//! File-backed queue writing one payload per line
//!
//! Each named queue maps to `<dir>/<queue>.jsonl`. Appends take an
//! exclusive file lock so several jobs can share a queue file.

use super::{ItemQueue, QueueError, QueueResult};
use async_trait::async_trait;
use fd_lock::RwLock;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Queue appending payloads to JSON-lines files
#[derive(Debug, Clone)]
pub struct JsonLinesQueue {
    dir: PathBuf,
}

impl JsonLinesQueue {
    /// Create a queue writing under `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the file backing `queue`
    pub fn queue_path(&self, queue: &str) -> PathBuf {
        self.dir.join(format!("{queue}.jsonl"))
    }

    fn append(path: &Path, payload: &[u8]) -> QueueResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| QueueError::IoError(e.to_string()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| QueueError::IoError(format!("Failed to open queue file: {e}")))?;

        let mut lock = RwLock::new(file);
        let mut guard = lock
            .write()
            .map_err(|e| QueueError::LockError(format!("Failed to acquire write lock: {e}")))?;

        // Payload and newline go out in a single write
        let mut line = Vec::with_capacity(payload.len() + 1);
        line.extend_from_slice(payload);
        line.push(b'\n');
        guard
            .write_all(&line)
            .map_err(|e| QueueError::IoError(format!("Failed to append to queue: {e}")))
    }
}

#[async_trait]
impl ItemQueue for JsonLinesQueue {
    async fn push(&self, queue: &str, payload: Vec<u8>) -> QueueResult<()> {
        if payload.contains(&b'\n') {
            return Err(QueueError::InvalidPayload(
                "payload contains a newline".to_string(),
            ));
        }

        let path = self.queue_path(queue);
        tokio::task::spawn_blocking(move || Self::append(&path, &payload))
            .await
            .map_err(|e| QueueError::IoError(format!("Append task failed: {e}")))?
    }
}

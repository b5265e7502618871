//! Local archive of raw backend responses
//!
//! Backends that support archiving write every raw response they fetch
//! through an [`ArchiveManager`]. A later job can replay those responses
//! instead of contacting the live source.
//!
//! Responses are stored as JSON lines, one file per category, under the
//! archive directory. Writers hold an exclusive `fd-lock` so concurrent
//! jobs sharing an archive never interleave partial lines. Readers stream
//! the file line by line and stop at a trailing line still being written.

use chrono::{DateTime, Utc};
use fd_lock::RwLock;
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

/// Archive errors
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Archive path was supplied but empty
    #[error("archive path cannot be empty")]
    EmptyPath,

    /// Archive path exists and is not a directory
    #[error("archive path {0:?} is not a directory")]
    NotADirectory(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Lock error
    #[error("lock error: {0}")]
    LockError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl ArchiveError {
    /// Whether the error comes from a bad archive configuration rather
    /// than from a failure while reading or writing
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::EmptyPath | Self::NotADirectory(_))
    }
}

/// Result type for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Shared handle to an opened archive
pub type ArchiveHandle = Arc<ArchiveManager>;

/// Stream of archived responses, in storage order
pub type ResponseStream = Pin<Box<dyn Stream<Item = ArchiveResult<ArchivedResponse>> + Send>>;

/// A raw response stored in the archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedResponse {
    /// Category of the items contained in the response
    pub category: String,
    /// Origin of the data (URL, file path...)
    pub origin: String,
    /// When the response was archived
    pub archived_at: DateTime<Utc>,
    /// Raw response payload
    pub payload: Value,
}

/// Manager of a local archive directory
#[derive(Debug)]
pub struct ArchiveManager {
    dirpath: PathBuf,
}

impl ArchiveManager {
    /// Open the archive located at `path`
    ///
    /// The directory is created on the first write. An empty path is a
    /// configuration error, which is different from not using an archive
    /// at all.
    pub fn open(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(ArchiveError::EmptyPath);
        }
        if path.exists() && !path.is_dir() {
            return Err(ArchiveError::NotADirectory(path.to_path_buf()));
        }

        debug!(path = %path.display(), "Archive opened");

        Ok(Self {
            dirpath: path.to_path_buf(),
        })
    }

    /// Open the archive and wrap it in a shareable handle
    pub fn open_shared(path: impl AsRef<Path>) -> ArchiveResult<ArchiveHandle> {
        Self::open(path).map(Arc::new)
    }

    /// Directory of the archive
    pub fn path(&self) -> &Path {
        &self.dirpath
    }

    fn category_path(&self, category: &str) -> PathBuf {
        self.dirpath.join(format!("{category}.jsonl"))
    }

    /// Store a raw response for `category`
    ///
    /// The line is appended by a blocking task holding an exclusive lock on
    /// the category file.
    pub async fn store(
        &self,
        category: &str,
        origin: &str,
        payload: Value,
    ) -> ArchiveResult<ArchivedResponse> {
        let response = ArchivedResponse {
            category: category.to_string(),
            origin: origin.to_string(),
            archived_at: Utc::now(),
            payload,
        };

        let mut line = serde_json::to_string(&response)
            .map_err(|e| ArchiveError::SerializationError(e.to_string()))?;
        line.push('\n');

        let dirpath = self.dirpath.clone();
        let path = self.category_path(category);
        tokio::task::spawn_blocking(move || Self::append(&dirpath, &path, line.as_bytes()))
            .await
            .map_err(|e| ArchiveError::IoError(format!("Archive task failed: {e}")))??;

        Ok(response)
    }

    fn append(dirpath: &Path, path: &Path, line: &[u8]) -> ArchiveResult<()> {
        std::fs::create_dir_all(dirpath).map_err(|e| ArchiveError::IoError(e.to_string()))?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| ArchiveError::IoError(format!("Failed to open archive file: {e}")))?;

        let mut lock = RwLock::new(file);
        let mut guard = lock
            .write()
            .map_err(|e| ArchiveError::LockError(format!("Failed to acquire write lock: {e}")))?;
        guard
            .write_all(line)
            .map_err(|e| ArchiveError::IoError(format!("Failed to write archive entry: {e}")))
    }

    /// Stream the responses stored for `category`
    ///
    /// Responses are read one line at a time and keep their storage order.
    /// When `archived_after` is set only responses archived strictly after
    /// that instant are yielded. The stream ends after the first error.
    pub async fn responses(
        &self,
        category: &str,
        archived_after: Option<DateTime<Utc>>,
    ) -> ArchiveResult<ResponseStream> {
        let path = self.category_path(category);
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(category, "No archived responses for category");
                return Ok(Box::pin(stream::empty()));
            }
            Err(e) => {
                return Err(ArchiveError::IoError(format!(
                    "Failed to open archive file: {e}"
                )))
            }
        };

        debug!(category, path = %path.display(), "Streaming archived responses");

        let stream = stream::unfold(Some(BufReader::new(file)), move |state| async move {
            let mut reader = state?;
            loop {
                let mut line = String::new();
                match reader.read_line(&mut line).await {
                    Ok(0) => return None,
                    // Partial line of a write in progress
                    Ok(_) if !line.ends_with('\n') => return None,
                    Ok(_) if line.trim().is_empty() => continue,
                    Ok(_) => {}
                    Err(e) => return Some((Err(ArchiveError::IoError(e.to_string())), None)),
                }

                match serde_json::from_str::<ArchivedResponse>(&line) {
                    Ok(response)
                        if archived_after.is_some_and(|after| response.archived_at <= after) =>
                    {
                        continue
                    }
                    Ok(response) => return Some((Ok(response), Some(reader))),
                    Err(e) => {
                        return Some((Err(ArchiveError::SerializationError(e.to_string())), None))
                    }
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

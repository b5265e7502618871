//! Data source backends
//!
//! A backend is a pluggable source of items. Each backend declares two
//! capabilities (archiving and resuming) and exposes two fetch
//! operations: a live fetch, and a replay of responses previously stored
//! in an archive. Backends are looked up by name through the
//! [`registry::BackendRegistry`].

use crate::archive::{ArchiveError, ArchiveHandle};
use crate::item::Item;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::Stream;
use serde_json::{Map, Value};
use std::pin::Pin;

pub mod jsonl;
pub mod registry;

pub use jsonl::JsonLinesBackend;
pub use registry::BackendRegistry;

/// Backend-specific fetch arguments
pub type FetchArgs = Map<String, Value>;

/// Backend errors
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// A required argument was not given
    #[error("missing required argument: {0}")]
    MissingArgument(String),

    /// An argument has an invalid value
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The backend does not produce items of the requested category
    #[error("unsupported category: {0}")]
    UnsupportedCategory(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Raw response could not be parsed
    #[error("parse error: {0}")]
    ParseError(String),

    /// Reading from or writing to the archive failed
    #[error("archive error: {0}")]
    ArchiveError(#[from] ArchiveError),

    /// Any other failure while fetching
    #[error("fetch error: {0}")]
    FetchError(String),
}

impl BackendError {
    /// Whether the error was caused by the arguments given to the backend
    ///
    /// Such errors will fail the same way on every attempt.
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::MissingArgument(_) | Self::InvalidArgument(_) | Self::UnsupportedCategory(_) => {
                true
            }
            Self::ArchiveError(e) => e.is_configuration(),
            _ => false,
        }
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Stream of items produced by a backend
pub type ItemStream = Pin<Box<dyn Stream<Item = BackendResult<Item>> + Send>>;

/// A data source able to produce items
#[async_trait]
pub trait Backend: Send + Sync {
    /// Name the backend is registered under
    fn name(&self) -> &str;

    /// Categories of items this backend can fetch
    fn categories(&self) -> &[&'static str];

    /// Whether raw responses can be stored in and replayed from an archive
    fn has_archiving(&self) -> bool;

    /// Whether a failed fetch can be resumed from a date or offset
    fn has_resuming(&self) -> bool;

    /// Fetch items from the live source
    ///
    /// # Arguments
    /// * `category` - Category of the items to fetch
    /// * `args` - Backend-specific arguments (`from_date`, `offset`...)
    /// * `archive` - When set, raw responses are written through it
    async fn fetch(
        &self,
        category: &str,
        args: &FetchArgs,
        archive: Option<ArchiveHandle>,
    ) -> BackendResult<ItemStream>;

    /// Rebuild items from the responses stored in an archive
    ///
    /// # Arguments
    /// * `category` - Category of the items to replay
    /// * `args` - Backend-specific arguments
    /// * `archive` - Archive to read responses from
    /// * `archived_after` - Only replay responses archived after this instant
    async fn fetch_from_archive(
        &self,
        category: &str,
        args: &FetchArgs,
        archive: ArchiveHandle,
        archived_after: Option<DateTime<Utc>>,
    ) -> BackendResult<ItemStream>;

    /// Fail with [`BackendError::UnsupportedCategory`] for unknown categories
    fn check_category(&self, category: &str) -> BackendResult<()> {
        if self.categories().contains(&category) {
            Ok(())
        } else {
            Err(BackendError::UnsupportedCategory(format!(
                "{} (backend {} supports {:?})",
                category,
                self.name(),
                self.categories()
            )))
        }
    }
}

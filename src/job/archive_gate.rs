//! Selection between live fetching and archive replay
//!
//! The gate owns the archive handle of a job and enforces the archiving
//! contract: archive arguments are only accepted by backends supporting
//! archives, and a replay needs an opened archive.

use super::JobError;
use crate::archive::{ArchiveHandle, ArchiveManager};
use crate::backend::{Backend, FetchArgs, ItemStream};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Archive arguments of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveArgs {
    /// Directory of the archive
    pub archive_path: String,
    /// Replay archived responses instead of fetching from the source
    #[serde(default)]
    pub fetch_from_archive: bool,
    /// Only replay responses archived after this date
    #[serde(default)]
    pub archived_after: Option<DateTime<Utc>>,
}

impl ArchiveArgs {
    /// Archive raw responses fetched from the live source
    pub fn store(archive_path: impl Into<String>) -> Self {
        Self {
            archive_path: archive_path.into(),
            fetch_from_archive: false,
            archived_after: None,
        }
    }

    /// Replay responses archived after `archived_after`
    pub fn replay(
        archive_path: impl Into<String>,
        archived_after: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            archive_path: archive_path.into(),
            fetch_from_archive: true,
            archived_after,
        }
    }
}

/// Where the items of a run come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPath {
    /// Fetch from the live source
    Live,
    /// Replay archived responses
    Replay {
        /// Only responses archived after this date
        archived_after: Option<DateTime<Utc>>,
    },
}

impl FetchPath {
    /// Select the fetch path for the given archive arguments
    pub fn select(archive_args: Option<&ArchiveArgs>) -> Self {
        match archive_args {
            Some(args) if args.fetch_from_archive => Self::Replay {
                archived_after: args.archived_after,
            },
            _ => Self::Live,
        }
    }
}

/// Reject archive arguments for backends without archiving support
pub fn validate_archiving(
    backend: &dyn Backend,
    archive_args: Option<&ArchiveArgs>,
) -> Result<(), JobError> {
    if archive_args.is_some() && !backend.has_archiving() {
        return Err(JobError::Configuration(format!(
            "archive attributes set but archive is not supported by backend {}",
            backend.name()
        )));
    }
    Ok(())
}

/// Archive state of a job
#[derive(Debug, Default)]
pub struct ArchiveGate {
    archive: Option<ArchiveHandle>,
}

impl ArchiveGate {
    /// Gate without archive
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the archive named by `archive_args`, if any
    pub fn open(archive_args: Option<&ArchiveArgs>) -> Result<Self, JobError> {
        let mut gate = Self::new();
        gate.ensure_open(archive_args)?;
        Ok(gate)
    }

    /// Currently opened archive
    pub fn archive(&self) -> Option<&ArchiveHandle> {
        self.archive.as_ref()
    }

    /// Make sure the archive named by `archive_args` is the opened one
    ///
    /// Without archive arguments the current state is kept.
    pub fn ensure_open(&mut self, archive_args: Option<&ArchiveArgs>) -> Result<(), JobError> {
        let Some(args) = archive_args else {
            return Ok(());
        };

        let already_open = self
            .archive
            .as_ref()
            .is_some_and(|archive| archive.path() == Path::new(&args.archive_path));
        if !already_open {
            self.archive = Some(ArchiveManager::open_shared(&args.archive_path)?);
        }
        Ok(())
    }

    /// Open the item stream of a run through the selected fetch path
    pub async fn open_stream(
        &self,
        backend: &dyn Backend,
        category: &str,
        args: &FetchArgs,
        archive_args: Option<&ArchiveArgs>,
    ) -> Result<ItemStream, JobError> {
        match FetchPath::select(archive_args) {
            FetchPath::Live => {
                debug!(archived = self.archive.is_some(), "Fetching items from source");
                Ok(backend.fetch(category, args, self.archive.clone()).await?)
            }
            FetchPath::Replay { archived_after } => {
                let archive = self.archive.clone().ok_or_else(|| {
                    JobError::Configuration("archive replay requested without archive".to_string())
                })?;
                debug!(?archived_after, "Fetching items from archive");
                Ok(backend
                    .fetch_from_archive(category, args, archive, archived_after)
                    .await?)
            }
        }
    }
}

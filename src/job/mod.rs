//! Resumable collection jobs
//!
//! This module drives a backend end to end: items are fetched (live or
//! replayed from an archive), tagged with job metadata, pushed to an output
//! queue, and tracked in a [`checkpoint::JobCheckpoint`] so that a failed
//! run can be resumed where it stopped.
//!
//! # Overview
//!
//! 1. **Request**: describe the job with [`config::JobRequest`]
//! 2. **Runner**: [`runner::CollectorJob`] performs a single pass over the backend
//! 3. **Orchestration**: [`orchestrator::execute_job`] retries failed passes,
//!    resuming from the checkpoint, until success or a fatal error
//!
//! # Quick Start
//!
//! ```no_run
//! use collector_jobs::backend::BackendRegistry;
//! use collector_jobs::job::{execute_job, JobRequest};
//! use collector_jobs::queue::InMemoryQueue;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut request = JobRequest::new("task-1", "jsonl", "item");
//! request.backend_args.insert("path".into(), "./items.jsonl".into());
//!
//! let queue = Arc::new(InMemoryQueue::new());
//! let checkpoint = execute_job(&request, BackendRegistry::builtin(), queue).await?;
//! println!("{} items fetched", checkpoint.nitems());
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! All operations return `Result<T, JobError>`. Errors are either fatal
//! (unknown backend, bad configuration, bad backend arguments) and never
//! retried, or transient and retried by resuming the job.

use crate::archive::ArchiveError;
use crate::backend::BackendError;
use crate::queue::QueueError;

pub mod archive_gate;
pub mod checkpoint;
pub mod config;
pub mod decorator;
pub mod orchestrator;
pub mod runner;

pub use archive_gate::{ArchiveArgs, ArchiveGate, FetchPath};
pub use checkpoint::JobCheckpoint;
pub use config::{JobRequest, SchedulerArgs};
pub use orchestrator::{execute_job, JobFailure, JobState, RetryPolicy, RunOutcome};
pub use runner::CollectorJob;

/// Job errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Backend name is not registered
    #[error("backend {0} not found")]
    NotFound(String),

    /// Job configuration is invalid
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Backend error
    #[error("backend error: {0}")]
    BackendError(#[from] BackendError),

    /// Archive error
    #[error("archive error: {0}")]
    ArchiveError(#[from] ArchiveError),

    /// Queue error
    #[error("queue error: {0}")]
    QueueError(#[from] QueueError),

    /// Item could not be serialized
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Item lacks a contractual field
    #[error("invalid item: {0}")]
    InvalidItem(String),
}

impl JobError {
    /// Whether the error must never be retried
    ///
    /// Fatal errors fail the same way on every attempt: unknown backends,
    /// invalid configuration, and backend argument errors.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::NotFound(_) | Self::Configuration(_) => true,
            Self::BackendError(e) => e.is_configuration(),
            Self::ArchiveError(e) => e.is_configuration(),
            Self::QueueError(_) | Self::SerializationError(_) | Self::InvalidItem(_) => false,
        }
    }
}

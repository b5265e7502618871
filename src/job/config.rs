//! Job configuration constants and request parameters

use super::archive_gate::ArchiveArgs;
use crate::backend::FetchArgs;
use serde::{Deserialize, Serialize};

/// Default maximum number of failed runs before a job is cancelled
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default name of the queue receiving the items
pub const DEFAULT_QUEUE: &str = "items";

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_queue() -> String {
    DEFAULT_QUEUE.to_string()
}

/// Scheduler arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerArgs {
    /// Maximum number of failed runs; the job is cancelled when reached
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for SchedulerArgs {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Parameters of a job invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    /// Job identifier; generated when not set
    #[serde(default)]
    pub job_id: Option<String>,
    /// Identifier of the task linked to the job
    pub task_id: String,
    /// Name of the backend to run
    pub backend: String,
    /// Category of the items to fetch
    pub category: String,
    /// Backend-specific arguments
    #[serde(default)]
    pub backend_args: FetchArgs,
    /// Archive arguments
    #[serde(default)]
    pub archive_args: Option<ArchiveArgs>,
    /// Scheduler arguments
    #[serde(default)]
    pub sched_args: SchedulerArgs,
    /// Name of the queue receiving the items
    #[serde(default = "default_queue")]
    pub queue: String,
}

impl JobRequest {
    /// Create a request with default arguments
    pub fn new(
        task_id: impl Into<String>,
        backend: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            job_id: None,
            task_id: task_id.into(),
            backend: backend.into(),
            category: category.into(),
            backend_args: FetchArgs::new(),
            archive_args: None,
            sched_args: SchedulerArgs::default(),
            queue: default_queue(),
        }
    }

    /// Set the job identifier
    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    /// Set the archive arguments
    pub fn with_archive(mut self, archive_args: ArchiveArgs) -> Self {
        self.archive_args = Some(archive_args);
        self
    }

    /// Set the maximum number of failed runs
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.sched_args.max_retries = max_retries;
        self
    }

    /// Validate request parameters
    ///
    /// The backend name is not checked here: an unknown or empty name is
    /// reported by the registry lookup.
    pub fn validate(&self) -> Result<(), String> {
        if self.task_id.is_empty() {
            return Err("Task id cannot be empty".to_string());
        }

        if self.category.is_empty() {
            return Err("Category cannot be empty".to_string());
        }

        if self.queue.is_empty() {
            return Err("Queue cannot be empty".to_string());
        }

        Ok(())
    }
}

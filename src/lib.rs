//! # Collector Jobs Library
//!
//! Resumable data collection jobs. A job runs a backend over a data source,
//! tags every fetched item with job metadata and forwards it to an output
//! queue, keeping a checkpoint so that an interrupted job can be resumed
//! where it left off.
//!
//! ## Features
//!
//! - **Pluggable Backends**: Backends are looked up by name in a [`BackendRegistry`]
//! - **Resume Capability**: Failed runs are resumed from the last checkpoint
//! - **Archive Support**: Raw responses can be archived and replayed later
//! - **Item Decoration**: Every item carries the crate version and its job id
//!
//! ## Quick Start
//!
//! ```no_run
//! use collector_jobs::{execute_job, BackendRegistry, InMemoryQueue, JobRequest};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut request = JobRequest::new("task-1", "jsonl", "item");
//! request
//!     .backend_args
//!     .insert("path".to_string(), "./items.jsonl".into());
//!
//! let queue = Arc::new(InMemoryQueue::new());
//! let checkpoint = execute_job(&request, BackendRegistry::builtin(), queue).await?;
//! println!("{} items fetched", checkpoint.nitems());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`item`] - Items produced by backends
//! - [`backend`] - Backend trait, registry and the built-in JSON lines backend
//! - [`archive`] - Storage of raw responses for later replay
//! - [`queue`] - Output queues receiving serialized items
//! - [`job`] - Checkpoints, decoration, runner and retry orchestration
//! - [`metrics`] - Job metrics and Prometheus exporter

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Archive of raw backend responses
pub mod archive;

/// Backends producing items
pub mod backend;

/// CLI command implementations
pub mod cli;

/// Items and their well-known fields
pub mod item;

/// Job execution
pub mod job;

/// Job metrics
pub mod metrics;

/// Output queues
pub mod queue;

/// Version of this crate, attached to every collected item
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export commonly used types
pub use archive::{ArchiveError, ArchiveManager};
pub use backend::{Backend, BackendError, BackendRegistry, FetchArgs, JsonLinesBackend};
pub use item::Item;
pub use job::{
    execute_job, ArchiveArgs, CollectorJob, JobCheckpoint, JobError, JobFailure, JobRequest,
    SchedulerArgs,
};
pub use queue::{InMemoryQueue, ItemQueue, JsonLinesQueue, QueueError};

//! Run command implementation
//!
//! Builds a [`JobRequest`] from command line flags or from a JSON job file,
//! executes it against the built-in backends and prints the resulting
//! checkpoint as JSON on stdout.

use super::CliError;
use crate::backend::BackendRegistry;
use crate::job::{execute_job, ArchiveArgs, JobCheckpoint, JobRequest};
use crate::metrics;
use crate::queue::JsonLinesQueue;
use chrono::{DateTime, Utc};
use clap::Args;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Default directory of the JSON-lines output queues
pub const DEFAULT_QUEUE_DIR: &str = "queues";

/// Parse a `key=value` backend argument
///
/// The value is read as JSON when it parses as such, as a plain string
/// otherwise, so `offset=10` gives a number and `path=/tmp/a` a string.
pub fn parse_key_value(s: &str) -> Result<(String, Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{s}`"))?;

    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in `{s}`"));
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Parse an RFC 3339 date
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 date `{s}`: {e}"))
}

/// Run subcommand
#[derive(Debug, Args)]
pub struct RunCommand {
    /// JSON file describing the whole job request
    #[arg(long, conflicts_with_all = ["backend", "category", "task_id"])]
    pub job_file: Option<PathBuf>,

    /// Name of the backend to run (e.g., jsonl)
    #[arg(long, required_unless_present = "job_file")]
    pub backend: Option<String>,

    /// Category of the items to fetch
    #[arg(long, required_unless_present = "job_file")]
    pub category: Option<String>,

    /// Identifier of the task linked to the job
    #[arg(long, required_unless_present = "job_file")]
    pub task_id: Option<String>,

    /// Job identifier (generated when omitted)
    #[arg(long)]
    pub job_id: Option<String>,

    /// Backend argument as KEY=VALUE, repeatable
    #[arg(long = "arg", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub args: Vec<(String, Value)>,

    /// Archive directory of raw responses
    #[arg(long)]
    pub archive_path: Option<String>,

    /// Replay archived responses instead of fetching from the source
    #[arg(long, requires = "archive_path")]
    pub fetch_from_archive: bool,

    /// Only replay responses archived after this RFC 3339 date
    #[arg(long, value_parser = parse_datetime, requires = "fetch_from_archive")]
    pub archived_after: Option<DateTime<Utc>>,

    /// Maximum number of failed runs before the job is cancelled
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_retries: Option<u32>,

    /// Directory of the JSON-lines output queues
    #[arg(long, default_value = DEFAULT_QUEUE_DIR)]
    pub queue_dir: PathBuf,

    /// Name of the output queue
    #[arg(long)]
    pub queue: Option<String>,

    /// Address of the Prometheus scrape endpoint (e.g., 127.0.0.1:9090)
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

impl RunCommand {
    /// Build the job request described by the flags
    ///
    /// Flags given next to `--job-file` override the values of the file.
    pub fn build_request(&self) -> Result<JobRequest, CliError> {
        let mut request = match &self.job_file {
            Some(path) => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    CliError::ConfigurationError(format!(
                        "Failed to read job file {}: {e}",
                        path.display()
                    ))
                })?;
                serde_json::from_str::<JobRequest>(&contents).map_err(|e| {
                    CliError::ConfigurationError(format!(
                        "Invalid job file {}: {e}",
                        path.display()
                    ))
                })?
            }
            None => {
                let required = |value: &Option<String>, flag: &str| {
                    value
                        .clone()
                        .ok_or_else(|| CliError::InvalidArgument(format!("--{flag} is required")))
                };
                JobRequest::new(
                    required(&self.task_id, "task-id")?,
                    required(&self.backend, "backend")?,
                    required(&self.category, "category")?,
                )
            }
        };

        if let Some(job_id) = &self.job_id {
            request.job_id = Some(job_id.clone());
        }
        for (key, value) in &self.args {
            request.backend_args.insert(key.clone(), value.clone());
        }
        if let Some(archive_path) = &self.archive_path {
            request.archive_args = Some(if self.fetch_from_archive {
                ArchiveArgs::replay(archive_path.clone(), self.archived_after)
            } else {
                ArchiveArgs::store(archive_path.clone())
            });
        }
        if let Some(max_retries) = self.max_retries {
            request.sched_args.max_retries = max_retries;
        }
        if let Some(queue) = &self.queue {
            request.queue = queue.clone();
        }

        request.validate().map_err(CliError::InvalidArgument)?;
        Ok(request)
    }

    /// Execute the run command
    pub async fn execute(&self) -> Result<(), CliError> {
        let request = self.build_request()?;

        if let Some(addr) = self.metrics_addr {
            metrics::init_metrics(addr)
                .await
                .map_err(|e| CliError::ConfigurationError(e.to_string()))?;
        }

        let queue = Arc::new(JsonLinesQueue::new(&self.queue_dir));

        info!(
            task_id = %request.task_id,
            backend = %request.backend,
            category = %request.category,
            queue = %queue.queue_path(&request.queue).display(),
            "Starting job"
        );

        match execute_job(&request, BackendRegistry::builtin(), queue).await {
            Ok(checkpoint) => {
                print_outcome(Some(&checkpoint), None);
                Ok(())
            }
            Err(failure) => {
                print_outcome(failure.checkpoint(), Some(&failure.to_string()));
                Err(failure.into())
            }
        }
    }
}

/// Print the outcome of a job as one JSON document
fn print_outcome(checkpoint: Option<&JobCheckpoint>, error: Option<&str>) {
    let output = json!({
        "success": error.is_none(),
        "error": error,
        "checkpoint": checkpoint,
    });
    println!("{output}");
}

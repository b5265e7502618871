//! Retry orchestration of a job
//!
//! A job is run until it succeeds or fails with an error that must not be
//! retried. Transient failures restart the job in resume mode, as long as
//! the backend can resume and the retry budget is not spent.
//!
//! The policy is a pure function from the number of failures so far and
//! the outcome of the last run to the next state and action, see
//! [`RetryPolicy::next`].

use super::archive_gate::validate_archiving;
use super::checkpoint::JobCheckpoint;
use super::config::JobRequest;
use super::runner::CollectorJob;
use super::JobError;
use crate::backend::BackendRegistry;
use crate::metrics::JobMetrics;
use crate::queue::ItemQueue;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// State of a job execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// A run is in progress
    Running,
    /// The last run failed and the job will be resumed
    Retry,
    /// The job completed
    Success,
    /// The job was cancelled
    Fatal,
}

/// Outcome of one run
#[derive(Debug)]
pub enum RunOutcome {
    /// The backend was exhausted
    Success,
    /// The run failed and may be resumed
    Retryable(JobError),
    /// The run failed and must not be retried
    Fatal(JobError),
}

impl RunOutcome {
    /// Classify the result of a run
    pub fn classify(result: Result<(), JobError>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(e) if e.is_fatal() => Self::Fatal(e),
            Err(e) => Self::Retryable(e),
        }
    }
}

/// What the orchestrator does next
#[derive(Debug)]
pub enum Action {
    /// Invoke the runner
    Run {
        /// Resume from the checkpoint instead of starting fresh
        resume: bool,
    },
    /// Return the checkpoint
    Finish,
    /// Cancel the job with the original error
    Raise(JobError),
}

/// Result of applying an outcome to the policy
#[derive(Debug)]
pub struct Transition {
    /// New state
    pub state: JobState,
    /// Failures counted so far
    pub failures: u32,
    /// Next action
    pub action: Action,
}

/// Retry policy of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of failures that cancels the job
    pub max_retries: u32,
    /// Whether the backend can resume
    pub resumable: bool,
}

impl RetryPolicy {
    /// Create a retry policy
    pub fn new(max_retries: u32, resumable: bool) -> Self {
        Self {
            max_retries,
            resumable,
        }
    }

    /// Compute the transition following `outcome`
    ///
    /// `failures` is the number of failed runs before this one.
    pub fn next(&self, failures: u32, outcome: RunOutcome) -> Transition {
        match outcome {
            RunOutcome::Success => Transition {
                state: JobState::Success,
                failures,
                action: Action::Finish,
            },
            RunOutcome::Fatal(e) => Transition {
                state: JobState::Fatal,
                failures,
                action: Action::Raise(e),
            },
            RunOutcome::Retryable(e) => {
                let failures = failures + 1;
                if !self.resumable || failures >= self.max_retries {
                    Transition {
                        state: JobState::Fatal,
                        failures,
                        action: Action::Raise(e),
                    }
                } else {
                    Transition {
                        state: JobState::Retry,
                        failures,
                        action: Action::Run { resume: true },
                    }
                }
            }
        }
    }
}

/// A job cancelled by an error
///
/// Displays as the original error, which is available unchanged through
/// [`JobFailure::error`]. The checkpoint reached before cancellation is
/// attached when the job could be created.
#[derive(Debug)]
pub struct JobFailure {
    error: JobError,
    checkpoint: Option<JobCheckpoint>,
}

impl JobFailure {
    /// Create a failure from an error and the checkpoint reached
    pub fn new(error: JobError, checkpoint: Option<JobCheckpoint>) -> Self {
        Self { error, checkpoint }
    }

    /// The error that cancelled the job
    pub fn error(&self) -> &JobError {
        &self.error
    }

    /// Checkpoint of the job when it was cancelled
    pub fn checkpoint(&self) -> Option<&JobCheckpoint> {
        self.checkpoint.as_ref()
    }

    /// Split the failure into its parts
    pub fn into_parts(self) -> (JobError, Option<JobCheckpoint>) {
        (self.error, self.checkpoint)
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl std::error::Error for JobFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.error)
    }
}

/// Execute a job, resuming it after transient failures
///
/// Returns the final checkpoint of the job.
///
/// # Errors
/// - [`JobError::NotFound`] when the backend is not registered
/// - [`JobError::Configuration`] when the request is invalid or archive
///   arguments are given to a backend without archiving support; checked
///   before any run
/// - any other error raised by the last run, unchanged
pub async fn execute_job(
    request: &JobRequest,
    registry: &BackendRegistry,
    queue: Arc<dyn ItemQueue>,
) -> Result<JobCheckpoint, JobFailure> {
    let job_id = request
        .job_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let metrics = JobMetrics::start(&request.backend, &request.category);
    let archive_args = request.archive_args.as_ref();

    let job = request
        .validate()
        .map_err(JobError::Configuration)
        .and_then(|()| {
            CollectorJob::new(
                &job_id,
                &request.task_id,
                &request.backend,
                &request.category,
                registry,
                queue,
            )
        })
        .and_then(|job| job.with_queue_name(&request.queue).with_archive(archive_args));

    let mut job = match job {
        Ok(job) => job,
        Err(e) => {
            error!(job_id = %job_id, task_id = %request.task_id, backend = %request.backend, error = %e, "Unable to create job");
            metrics.record_failure(&e.to_string());
            return Err(JobFailure::new(e, None));
        }
    };

    debug!(
        job_id = %job_id,
        task_id = %request.task_id,
        backend = %request.backend,
        category = %request.category,
        "Running job"
    );

    if let Err(e) = validate_archiving(job.backend(), archive_args) {
        metrics.record_failure(&e.to_string());
        return Err(JobFailure::new(e, Some(job.into_result())));
    }

    let policy = RetryPolicy::new(request.sched_args.max_retries, job.has_resuming());
    let mut failures = 0;
    let mut action = Action::Run { resume: false };

    loop {
        match action {
            Action::Run { resume } => {
                let outcome =
                    RunOutcome::classify(job.run(&request.backend_args, archive_args, resume).await);
                if let RunOutcome::Retryable(e) | RunOutcome::Fatal(e) = &outcome {
                    debug!(
                        job_id = %job_id,
                        task_id = %request.task_id,
                        backend = %request.backend,
                        error = %e,
                        "Error running job"
                    );
                }

                let transition = policy.next(failures, outcome);
                failures = transition.failures;
                if transition.state == JobState::Retry {
                    warn!(
                        job_id = %job_id,
                        task_id = %request.task_id,
                        backend = %request.backend,
                        failures = failures,
                        max_retries = policy.max_retries,
                        "Resuming job due to a failure"
                    );
                    metrics.record_resume();
                }
                action = transition.action;
            }
            Action::Finish => break,
            Action::Raise(e) => {
                error!(
                    job_id = %job_id,
                    task_id = %request.task_id,
                    backend = %request.backend,
                    failures = failures,
                    error = %e,
                    "Cancelling job"
                );
                metrics.record_failure(&e.to_string());
                return Err(JobFailure::new(e, Some(job.into_result())));
            }
        }
    }

    let result = job.into_result();
    metrics.record_success(result.nitems());

    info!(
        job_id = %result.job_id(),
        task_id = %result.task_id(),
        backend = %result.backend(),
        category = %result.category(),
        nitems = result.nitems(),
        nresumed = result.nresumed(),
        "Job completed"
    );

    Ok(result)
}

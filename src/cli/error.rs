//! CLI error types and conversions

use crate::job::JobFailure;
use crate::queue::QueueError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// The job was cancelled
    #[error("job failed: {0}")]
    JobFailed(#[from] JobFailure),

    /// Queue error
    #[error("queue error: {0}")]
    QueueError(#[from] QueueError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}

//! Single pass of a job over its backend

use super::archive_gate::{ArchiveArgs, ArchiveGate};
use super::checkpoint::JobCheckpoint;
use super::config::DEFAULT_QUEUE;
use super::decorator::decorate;
use super::JobError;
use crate::backend::{Backend, BackendRegistry, FetchArgs};
use crate::item::Item;
use crate::metrics;
use crate::queue::ItemQueue;
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::{debug, Instrument};

/// Runs a backend and forwards its items to an output queue
///
/// The runner owns the checkpoint of the job. Every forwarded item is
/// pushed to the queue first and recorded in the checkpoint right after,
/// so when a run fails the checkpoint describes exactly what reached the
/// queue.
pub struct CollectorJob {
    job_id: String,
    task_id: String,
    category: String,
    backend: Arc<dyn Backend>,
    queue: Arc<dyn ItemQueue>,
    queue_name: String,
    gate: ArchiveGate,
    result: JobCheckpoint,
}

impl CollectorJob {
    /// Create a job for the backend registered as `backend_name`
    ///
    /// # Errors
    /// Returns [`JobError::NotFound`] when no backend has that name.
    pub fn new(
        job_id: impl Into<String>,
        task_id: impl Into<String>,
        backend_name: &str,
        category: impl Into<String>,
        registry: &BackendRegistry,
        queue: Arc<dyn ItemQueue>,
    ) -> Result<Self, JobError> {
        let backend = registry
            .find(backend_name)
            .ok_or_else(|| JobError::NotFound(backend_name.to_string()))?;

        let job_id = job_id.into();
        let task_id = task_id.into();
        let category = category.into();
        let result = JobCheckpoint::new(&job_id, &task_id, backend_name, &category);

        Ok(Self {
            job_id,
            task_id,
            category,
            backend,
            queue,
            queue_name: DEFAULT_QUEUE.to_string(),
            gate: ArchiveGate::new(),
            result,
        })
    }

    /// Set the name of the queue receiving the items
    pub fn with_queue_name(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = queue_name.into();
        self
    }

    /// Open the archive named by `archive_args`
    ///
    /// # Errors
    /// Fails when the archive path is empty or not a directory.
    pub fn with_archive(mut self, archive_args: Option<&ArchiveArgs>) -> Result<Self, JobError> {
        self.gate = ArchiveGate::open(archive_args)?;
        Ok(self)
    }

    /// Job identifier
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Task identifier
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Backend run by this job
    pub fn backend(&self) -> &dyn Backend {
        &*self.backend
    }

    /// Whether the backend supports archiving
    pub fn has_archiving(&self) -> bool {
        self.backend.has_archiving()
    }

    /// Whether the backend supports resuming
    pub fn has_resuming(&self) -> bool {
        self.backend.has_resuming()
    }

    /// Current checkpoint of the job
    pub fn result(&self) -> &JobCheckpoint {
        &self.result
    }

    /// Consume the job, returning its checkpoint
    pub fn into_result(self) -> JobCheckpoint {
        self.result
    }

    /// Run the backend once, forwarding every item to the queue
    ///
    /// A fresh run (`resume == false`) discards previous progress and uses
    /// `fetch_args` as given. A resumed run overwrites `from_date` and
    /// `offset` with the checkpoint values and counts one more resume.
    ///
    /// Any error is returned as is; the checkpoint keeps the progress made
    /// before it.
    pub async fn run(
        &mut self,
        fetch_args: &FetchArgs,
        archive_args: Option<&ArchiveArgs>,
        resume: bool,
    ) -> Result<(), JobError> {
        let span = tracing::info_span!(
            "collector_job",
            job_id = %self.job_id,
            task_id = %self.task_id,
            backend = %self.result.backend(),
            category = %self.category,
            resume = resume
        );

        self.run_pass(fetch_args, archive_args, resume)
            .instrument(span)
            .await
    }

    async fn run_pass(
        &mut self,
        fetch_args: &FetchArgs,
        archive_args: Option<&ArchiveArgs>,
        resume: bool,
    ) -> Result<(), JobError> {
        self.gate.ensure_open(archive_args)?;

        let args = if resume {
            self.result.mark_resumed();
            self.result.resume_args(fetch_args)
        } else {
            self.result.reset();
            fetch_args.clone()
        };

        debug!(
            from_date = ?args.get("from_date"),
            offset = ?args.get("offset"),
            nresumed = self.result.nresumed(),
            "Starting run"
        );

        let stream = self
            .gate
            .open_stream(&*self.backend, &self.category, &args, archive_args)
            .await?;
        let mut stream = std::pin::pin!(decorate(stream, &self.job_id));

        while let Some(item) = stream.next().await {
            self.forward(item?).await?;
        }

        debug!(
            nitems = self.result.nitems(),
            last_uuid = ?self.result.last_uuid(),
            "Run finished"
        );

        Ok(())
    }

    /// Push one item to the queue and record it in the checkpoint
    async fn forward(&mut self, item: Item) -> Result<(), JobError> {
        let uuid = item
            .uuid()
            .ok_or_else(|| JobError::InvalidItem("item has no uuid".to_string()))?
            .to_string();
        let updated_on = item
            .updated_on()
            .filter(|ts| ts.is_finite())
            .ok_or_else(|| {
                JobError::InvalidItem(format!("item {uuid} has no valid updated_on"))
            })?;
        let offset = item.offset();

        let payload = item
            .to_bytes()
            .map_err(|e| JobError::SerializationError(e.to_string()))?;
        self.queue.push(&self.queue_name, payload).await?;

        self.result.record(&uuid, updated_on, offset);
        metrics::record_item_forwarded(self.result.backend(), &self.category);

        Ok(())
    }
}

impl std::fmt::Debug for CollectorJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorJob")
            .field("job_id", &self.job_id)
            .field("task_id", &self.task_id)
            .field("backend", &self.backend.name())
            .field("category", &self.category)
            .field("queue_name", &self.queue_name)
            .field("result", &self.result)
            .finish()
    }
}

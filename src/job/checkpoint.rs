//! Checkpoint of a job: the progress needed to resume it
//!
//! The checkpoint is also the result of a job. It is owned by a single
//! runner and updated once per forwarded item.

use crate::backend::FetchArgs;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Convert epoch seconds to a UTC date, with millisecond precision
pub fn epoch_to_datetime(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
}

/// Resumable progress of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCheckpoint {
    job_id: String,
    task_id: String,
    backend: String,
    category: String,
    last_uuid: Option<String>,
    max_date: Option<f64>,
    nitems: u64,
    offset: Option<i64>,
    nresumed: u32,
}

impl JobCheckpoint {
    /// Create a checkpoint with no progress
    pub fn new(
        job_id: impl Into<String>,
        task_id: impl Into<String>,
        backend: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            task_id: task_id.into(),
            backend: backend.into(),
            category: category.into(),
            last_uuid: None,
            max_date: None,
            nitems: 0,
            offset: None,
            nresumed: 0,
        }
    }

    /// Seed progress values, e.g. from a checkpoint persisted by a scheduler
    pub fn with_progress(
        mut self,
        last_uuid: Option<String>,
        max_date: Option<f64>,
        nitems: u64,
        offset: Option<i64>,
        nresumed: u32,
    ) -> Self {
        self.last_uuid = last_uuid;
        self.max_date = max_date;
        self.nitems = nitems;
        self.offset = offset;
        self.nresumed = nresumed;
        self
    }

    /// Job identifier
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Task identifier
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Backend name
    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// Category of the items
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Identifier of the last forwarded item
    pub fn last_uuid(&self) -> Option<&str> {
        self.last_uuid.as_deref()
    }

    /// Maximum "updated" timestamp seen, in epoch seconds
    pub fn max_date(&self) -> Option<f64> {
        self.max_date
    }

    /// Number of forwarded items
    pub fn nitems(&self) -> u64 {
        self.nitems
    }

    /// Last offset seen
    pub fn offset(&self) -> Option<i64> {
        self.offset
    }

    /// Number of times the job was resumed
    pub fn nresumed(&self) -> u32 {
        self.nresumed
    }

    /// Discard all progress, keeping the identifiers
    pub fn reset(&mut self) {
        self.last_uuid = None;
        self.max_date = None;
        self.nitems = 0;
        self.offset = None;
        self.nresumed = 0;
    }

    /// Count one more resumed run
    pub fn mark_resumed(&mut self) {
        self.nresumed += 1;
    }

    /// Account for a forwarded item
    ///
    /// `max_date` only moves forward; `offset` is overwritten whenever the
    /// item carries one.
    pub fn record(&mut self, uuid: &str, updated_on: f64, offset: Option<i64>) {
        self.nitems += 1;
        self.last_uuid = Some(uuid.to_string());

        if self.max_date.map_or(true, |max| max < updated_on) {
            self.max_date = Some(updated_on);
        }
        if offset.is_some() {
            self.offset = offset;
        }
    }

    /// Date to resume from, derived from `max_date`
    pub fn from_date(&self) -> Option<DateTime<Utc>> {
        self.max_date.and_then(epoch_to_datetime)
    }

    /// Arguments for a resumed run
    ///
    /// `from_date` and `offset` overwrite the caller values when the
    /// checkpoint has them; every other argument is kept.
    pub fn resume_args(&self, args: &FetchArgs) -> FetchArgs {
        let mut args = args.clone();

        if let Some(from_date) = self.from_date() {
            args.insert(
                "from_date".to_string(),
                Value::String(from_date.to_rfc3339_opts(SecondsFormat::Millis, true)),
            );
        }
        if let Some(offset) = self.offset {
            args.insert("offset".to_string(), Value::from(offset));
        }

        args
    }
}

//! Job observability metrics
//!
//! Counters and histograms describing job executions: completed and failed
//! jobs, resumes, forwarded items and run durations.
//!
//! ## Architecture
//!
//! - Uses the `metrics` crate for low-overhead metric collection
//! - Optional Prometheus exporter for a scrape endpoint
//! - Recording is a no-op until a recorder is installed

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Initialize metrics system with Prometheus exporter
///
/// Idempotent: later calls are ignored once the exporter is installed.
///
/// # Arguments
/// * `addr` - Socket address to bind the Prometheus scrape endpoint (e.g., "0.0.0.0:9090")
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "jobs_completed_total",
        Unit::Count,
        "Total number of jobs that completed successfully"
    );

    describe_counter!(
        "jobs_failed_total",
        Unit::Count,
        "Total number of jobs cancelled after a fatal failure"
    );

    describe_counter!(
        "job_resumes_total",
        Unit::Count,
        "Total number of runs resumed after a failure"
    );

    describe_counter!(
        "items_forwarded_total",
        Unit::Count,
        "Total number of items pushed to output queues"
    );

    describe_histogram!(
        "job_duration_seconds",
        Unit::Seconds,
        "Duration of a job from start to completion or cancellation"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Check if metrics system is initialized
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Record one item pushed to the output queue
pub fn record_item_forwarded(backend: &str, category: &str) {
    counter!(
        "items_forwarded_total",
        "backend" => backend.to_string(),
        "category" => category.to_string(),
    )
    .increment(1);
}

/// Metrics of a single job execution
pub struct JobMetrics {
    backend: String,
    category: String,
    start_time: Instant,
}

impl JobMetrics {
    /// Start tracking a job
    pub fn start(backend: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            category: category.into(),
            start_time: Instant::now(),
        }
    }

    /// Record a run resumed after a failure
    pub fn record_resume(&self) {
        counter!(
            "job_resumes_total",
            "backend" => self.backend.clone(),
            "category" => self.category.clone(),
        )
        .increment(1);
    }

    /// Record successful job completion
    pub fn record_success(&self, items_count: u64) {
        let duration = self.start_time.elapsed();

        counter!(
            "jobs_completed_total",
            "backend" => self.backend.clone(),
            "category" => self.category.clone(),
        )
        .increment(1);
        histogram!("job_duration_seconds", "outcome" => "success")
            .record(duration.as_secs_f64());

        debug!(
            backend = %self.backend,
            category = %self.category,
            items_count = items_count,
            duration_ms = duration.as_millis() as u64,
            "Job metrics recorded"
        );
    }

    /// Record a job cancelled after a fatal failure
    pub fn record_failure(&self, error: &str) {
        let duration = self.start_time.elapsed();

        counter!(
            "jobs_failed_total",
            "backend" => self.backend.clone(),
            "category" => self.category.clone(),
        )
        .increment(1);
        histogram!("job_duration_seconds", "outcome" => "failure")
            .record(duration.as_secs_f64());

        debug!(
            backend = %self.backend,
            category = %self.category,
            error = %error,
            duration_ms = duration.as_millis() as u64,
            "Job failure metrics recorded"
        );
    }
}

//! Integration tests for logging and tracing
//!
//! Job events are captured through a subscriber writing into memory.

use super::common::{items, registry, ScriptedBackend, FAILURE};
use collector_jobs::job::{execute_job, JobRequest};
use collector_jobs::queue::InMemoryQueue;
use serde_json::Value;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

/// Writer collecting formatted events
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn line_with(&self, message: &str) -> String {
        self.lines()
            .into_iter()
            .find(|line| line.contains(message))
            .unwrap_or_else(|| panic!("no log line with {message:?}"))
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run a job failing on every fetch, cancelled after two runs
async fn run_failing_job() {
    let backend = Arc::new(ScriptedBackend::new("scripted", items(3)).always_failing_after(0));
    let request = JobRequest::new("task-log", "scripted", "item")
        .with_job_id("job-log")
        .with_max_retries(2);

    let failure = execute_job(&request, &registry(backend), Arc::new(InMemoryQueue::new()))
        .await
        .unwrap_err();
    assert_eq!(failure.checkpoint().unwrap().nresumed(), 1);
}

#[tokio::test]
async fn test_retry_and_cancel_events_identify_the_job() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(Level::DEBUG)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    run_failing_job().await;

    let resuming = logs.line_with("Resuming job due to a failure");
    assert!(resuming.contains("WARN"));
    assert!(resuming.contains("job_id=job-log"));
    assert!(resuming.contains("task_id=task-log"));
    assert!(resuming.contains("failures=1"));

    let cancelling = logs.line_with("Cancelling job");
    assert!(cancelling.contains("ERROR"));
    assert!(cancelling.contains("job_id=job-log"));
    assert!(cancelling.contains("task_id=task-log"));
    assert!(cancelling.contains(FAILURE));

    let run_error = logs.line_with("Error running job");
    assert!(run_error.contains("DEBUG"));
    assert!(run_error.contains("task_id=task-log"));
}

#[tokio::test]
async fn test_cancelled_job_logs_a_single_error() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(Level::DEBUG)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    run_failing_job().await;

    let errors: Vec<String> = logs
        .lines()
        .into_iter()
        .filter(|line| line.contains("ERROR"))
        .collect();
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].contains("Cancelling job"));
}

#[tokio::test]
async fn test_json_events_carry_job_fields() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_writer(logs.clone())
        .with_max_level(Level::WARN)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    run_failing_job().await;

    let events: Vec<Value> = logs
        .lines()
        .iter()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert!(!events.is_empty());

    for message in ["Resuming job due to a failure", "Cancelling job"] {
        let event = events
            .iter()
            .find(|event| event["fields"]["message"] == message)
            .unwrap_or_else(|| panic!("no event {message:?}"));
        assert_eq!(event["fields"]["job_id"], "job-log");
        assert_eq!(event["fields"]["task_id"], "task-log");
    }
}

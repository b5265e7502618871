//! Integration tests for job execution, decoration and the archiving contract

use super::common::{items, registry, ScriptedBackend};
use collector_jobs::archive::ArchiveError;
use collector_jobs::backend::FetchArgs;
use collector_jobs::item::{JOB_ID_FIELD, VERSION_FIELD};
use collector_jobs::job::{execute_job, ArchiveArgs, CollectorJob, JobError, JobRequest};
use collector_jobs::queue::{InMemoryQueue, JsonLinesQueue};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

fn payloads_of(raw: Vec<Vec<u8>>) -> Vec<Value> {
    raw.iter()
        .map(|payload| serde_json::from_slice(payload).unwrap())
        .collect()
}

#[tokio::test]
async fn test_items_are_forwarded_with_metadata() {
    let backend = Arc::new(ScriptedBackend::new("scripted", items(4)));
    let queue = Arc::new(InMemoryQueue::new());
    let request = JobRequest::new("task-1", "scripted", "item").with_job_id("job-7");

    let checkpoint = execute_job(&request, &registry(backend), queue.clone())
        .await
        .unwrap();

    assert_eq!(checkpoint.job_id(), "job-7");
    assert_eq!(checkpoint.nitems(), 4);
    assert_eq!(checkpoint.last_uuid(), Some("item-3"));
    assert_eq!(checkpoint.offset(), Some(3));
    assert_eq!(checkpoint.nresumed(), 0);

    let payloads = payloads_of(queue.items("items").await);
    assert_eq!(payloads.len(), 4);
    for payload in payloads {
        assert_eq!(payload[JOB_ID_FIELD], json!("job-7"));
        assert_eq!(payload[VERSION_FIELD], json!(collector_jobs::VERSION));
    }
}

#[tokio::test]
async fn test_job_id_is_generated_when_missing() {
    let backend = Arc::new(ScriptedBackend::new("scripted", items(1)));
    let queue = Arc::new(InMemoryQueue::new());
    let request = JobRequest::new("task-1", "scripted", "item");

    let checkpoint = execute_job(&request, &registry(backend), queue.clone())
        .await
        .unwrap();

    assert!(uuid::Uuid::parse_str(checkpoint.job_id()).is_ok());
    let payloads = payloads_of(queue.items("items").await);
    assert_eq!(payloads[0][JOB_ID_FIELD], json!(checkpoint.job_id()));
}

#[tokio::test]
async fn test_unknown_backend_is_fatal() {
    let backend = Arc::new(ScriptedBackend::new("scripted", items(1)));
    let queue = Arc::new(InMemoryQueue::new());
    let request = JobRequest::new("task-1", "missing", "item");

    let failure = execute_job(&request, &registry(backend), queue)
        .await
        .unwrap_err();

    assert!(matches!(failure.error(), JobError::NotFound(name) if name == "missing"));
    assert!(failure.checkpoint().is_none());
}

#[tokio::test]
async fn test_empty_backend_name_is_not_found() {
    let backend = Arc::new(ScriptedBackend::new("scripted", items(1)));
    let queue = Arc::new(InMemoryQueue::new());
    let request = JobRequest::new("task-1", "", "item");

    let failure = execute_job(&request, &registry(backend.clone()), queue)
        .await
        .unwrap_err();

    assert!(matches!(failure.error(), JobError::NotFound(name) if name.is_empty()));
    assert!(failure.error().is_fatal());
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_archiving_refused_before_any_fetch() {
    let temp_dir = TempDir::new().unwrap();
    let backend = Arc::new(ScriptedBackend::new("scripted", items(3)).without_archiving());
    let queue = Arc::new(InMemoryQueue::new());
    let request = JobRequest::new("task-1", "scripted", "item").with_archive(ArchiveArgs::store(
        temp_dir.path().to_string_lossy().to_string(),
    ));

    let failure = execute_job(&request, &registry(backend.clone()), queue.clone())
        .await
        .unwrap_err();

    assert!(matches!(failure.error(), JobError::Configuration(_)));
    assert!(backend.calls().is_empty());
    assert_eq!(queue.len("items").await, 0);
}

#[tokio::test]
async fn test_empty_archive_path_fails_before_any_fetch() {
    for archive_args in [ArchiveArgs::store(""), ArchiveArgs::replay("", None)] {
        let backend = Arc::new(ScriptedBackend::new("scripted", items(3)));
        let queue = Arc::new(InMemoryQueue::new());
        let request = JobRequest::new("task-1", "scripted", "item").with_archive(archive_args);

        let failure = execute_job(&request, &registry(backend.clone()), queue)
            .await
            .unwrap_err();

        assert!(matches!(
            failure.error(),
            JobError::ArchiveError(ArchiveError::EmptyPath)
        ));
        assert!(failure.checkpoint().is_none());
        assert!(backend.calls().is_empty());
    }
}

#[tokio::test]
async fn test_replay_path_is_decorated() {
    let temp_dir = TempDir::new().unwrap();
    let backend = Arc::new(ScriptedBackend::new("scripted", items(2)));
    let queue = Arc::new(InMemoryQueue::new());
    let request = JobRequest::new("task-1", "scripted", "item")
        .with_job_id("job-replay")
        .with_archive(ArchiveArgs::replay(
            temp_dir.path().to_string_lossy().to_string(),
            None,
        ));

    execute_job(&request, &registry(backend.clone()), queue.clone())
        .await
        .unwrap();

    assert!(backend.calls().iter().all(|call| call.replay));
    let payloads = payloads_of(queue.items("items").await);
    assert_eq!(payloads.len(), 2);
    for payload in payloads {
        assert_eq!(payload[JOB_ID_FIELD], json!("job-replay"));
        assert_eq!(payload[VERSION_FIELD], json!(collector_jobs::VERSION));
    }
}

#[tokio::test]
async fn test_fresh_run_resets_previous_progress() {
    let backend = Arc::new(ScriptedBackend::new("scripted", items(5)).with_plan([Some(3), None]));
    let queue = Arc::new(InMemoryQueue::new());
    let registry = registry(backend);
    let mut job = CollectorJob::new("job-1", "task-1", "scripted", "item", &registry, queue).unwrap();

    assert!(job.run(&FetchArgs::new(), None, false).await.is_err());
    assert_eq!(job.result().nitems(), 3);

    job.run(&FetchArgs::new(), None, false).await.unwrap();

    let result = job.result();
    assert_eq!(result.nitems(), 5);
    assert_eq!(result.last_uuid(), Some("item-4"));
    assert_eq!(result.offset(), Some(4));
    assert_eq!(result.nresumed(), 0);
}

#[tokio::test]
async fn test_items_reach_file_queue() {
    let temp_dir = TempDir::new().unwrap();
    let backend = Arc::new(ScriptedBackend::new("scripted", items(3)));
    let queue = Arc::new(JsonLinesQueue::new(temp_dir.path()));
    let mut request = JobRequest::new("task-1", "scripted", "item").with_job_id("job-f");
    request.queue = "collected".to_string();

    let checkpoint = execute_job(&request, &registry(backend), queue.clone())
        .await
        .unwrap();

    let contents = std::fs::read_to_string(queue.queue_path("collected")).unwrap();
    let lines: Vec<Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len() as u64, checkpoint.nitems());
    assert_eq!(lines[2]["uuid"], json!("item-2"));
}

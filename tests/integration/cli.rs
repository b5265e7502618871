//! Integration tests for the collector-jobs binary

use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

fn source(n: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for i in 0..n {
        writeln!(file, r#"{{"id": {i}, "updated": {}}}"#, 1_700_000_000 + i).unwrap();
    }
    file
}

#[test]
fn test_backends_lists_builtin_backend() {
    let output = Command::cargo_bin("collector-jobs")
        .unwrap()
        .args(["backends", "--format", "json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let backends: Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = backends
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|b| b["name"].as_str())
        .collect();
    assert!(names.contains(&"jsonl"));
}

#[test]
fn test_run_writes_items_and_prints_checkpoint() {
    let file = source(3);
    let queue_dir = TempDir::new().unwrap();
    let path_arg = format!("path={}", file.path().display());

    let output = Command::cargo_bin("collector-jobs")
        .unwrap()
        .args([
            "run",
            "--backend",
            "jsonl",
            "--category",
            "item",
            "--task-id",
            "task-1",
            "--job-id",
            "job-cli",
            "--arg",
            path_arg.as_str(),
            "--queue",
            "out",
            "--queue-dir",
        ])
        .arg(queue_dir.path())
        .output()
        .unwrap();

    assert!(output.status.success());

    let outcome: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["success"], Value::Bool(true));
    assert_eq!(outcome["checkpoint"]["nitems"], 3);
    assert_eq!(outcome["checkpoint"]["job_id"], "job-cli");

    let contents = fs::read_to_string(queue_dir.path().join("out.jsonl")).unwrap();
    assert_eq!(contents.lines().count(), 3);
}

#[test]
fn test_run_with_unknown_backend_fails() {
    let queue_dir = TempDir::new().unwrap();

    let output = Command::cargo_bin("collector-jobs")
        .unwrap()
        .args([
            "run",
            "--backend",
            "nope",
            "--category",
            "item",
            "--task-id",
            "task-1",
            "--queue-dir",
        ])
        .arg(queue_dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let outcome: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["success"], Value::Bool(false));
    assert!(outcome["checkpoint"].is_null());
}

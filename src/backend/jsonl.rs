//! JSON-lines file backend
//!
//! Reads raw records from a local file with one JSON object per line.
//! Every record needs an `id` and an `updated` field; `updated` is either
//! an RFC 3339 string or a number of seconds since the Unix epoch.
//!
//! Arguments:
//! - `path` (required): file to read
//! - `from_date` (optional): RFC 3339 date, records updated before it are skipped
//! - `offset` (optional): zero-based line index to start from
//!
//! The item offset is the index of the line following the record, so a
//! resumed job continues right after the last forwarded line. Only records
//! that pass the filters are archived.

use super::{Backend, BackendError, BackendResult, FetchArgs, ItemStream};
use crate::archive::{ArchiveHandle, ArchivedResponse};
use crate::item::{Item, OFFSET_FIELD, UPDATED_ON_FIELD, UUID_FIELD};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{future, stream, StreamExt};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::debug;

const BACKEND_NAME: &str = "jsonl";
const CATEGORY_ITEM: &str = "item";
const CATEGORIES: &[&str] = &[CATEGORY_ITEM];

/// Backend reading items from a JSON-lines file
#[derive(Debug, Default)]
pub struct JsonLinesBackend;

impl JsonLinesBackend {
    /// Create a new JSON-lines backend
    pub fn new() -> Self {
        Self
    }

    /// Compute the identifier of a record: SHA-256 of its origin and id
    pub fn compute_uuid(origin: &str, id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(origin.as_bytes());
        hasher.update(b":");
        hasher.update(id.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Filters derived from `from_date` and `offset`
#[derive(Debug, Clone, Copy, Default)]
struct Filters {
    from_date_ms: Option<i64>,
    offset: i64,
}

impl Filters {
    fn from_args(args: &FetchArgs) -> BackendResult<Self> {
        let from_date_ms = match args.get("from_date") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(
                DateTime::parse_from_rfc3339(s)
                    .map_err(|e| BackendError::InvalidArgument(format!("from_date: {e}")))?
                    .timestamp_millis(),
            ),
            Some(other) => {
                return Err(BackendError::InvalidArgument(format!(
                    "from_date must be an RFC 3339 string, got {other}"
                )))
            }
        };

        let offset = match args.get("offset") {
            None | Some(Value::Null) => 0,
            Some(value) => match value.as_i64() {
                Some(offset) if offset >= 0 => offset,
                _ => {
                    return Err(BackendError::InvalidArgument(format!(
                        "offset must be a non-negative integer, got {value}"
                    )))
                }
            },
        };

        Ok(Self {
            from_date_ms,
            offset,
        })
    }

    fn skips_line(&self, line: i64) -> bool {
        line < self.offset
    }

    fn skips_item(&self, item: &Item) -> bool {
        match (self.from_date_ms, item.updated_on()) {
            (Some(from), Some(updated)) => ((updated * 1000.0).round() as i64) < from,
            _ => false,
        }
    }
}

fn required_path(args: &FetchArgs) -> BackendResult<String> {
    match args.get("path") {
        Some(Value::String(path)) if !path.is_empty() => Ok(path.clone()),
        Some(Value::String(_)) => Err(BackendError::InvalidArgument(
            "path cannot be empty".to_string(),
        )),
        Some(other) => Err(BackendError::InvalidArgument(format!(
            "path must be a string, got {other}"
        ))),
        None => Err(BackendError::MissingArgument("path".to_string())),
    }
}

/// Parse the `updated` field of a raw record into epoch seconds
fn parse_updated(value: &Value) -> BackendResult<f64> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.timestamp_millis() as f64 / 1000.0)
            .map_err(|e| BackendError::ParseError(format!("invalid updated date {s:?}: {e}"))),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| BackendError::ParseError(format!("invalid updated timestamp {n}"))),
        other => Err(BackendError::ParseError(format!(
            "invalid updated field {other}"
        ))),
    }
}

/// Build an item from a raw record found at `line` of `origin`
///
/// The offset points at the next line to read.
fn build_item(origin: &str, category: &str, line: i64, record: Value) -> BackendResult<Item> {
    let id = match record.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(BackendError::ParseError(format!(
                "record at line {line} has no id"
            )))
        }
    };
    let updated = record
        .get("updated")
        .ok_or_else(|| BackendError::ParseError(format!("record at line {line} has no updated")))
        .and_then(parse_updated)?;

    Ok(Item::new()
        .with("backend_name", BACKEND_NAME)
        .with("category", category)
        .with("origin", origin)
        .with(UUID_FIELD, JsonLinesBackend::compute_uuid(origin, &id))
        .with(UPDATED_ON_FIELD, updated)
        .with(OFFSET_FIELD, line + 1)
        .with("data", record))
}

/// State of a live read over the file
struct LiveRead {
    lines: Lines<BufReader<tokio::fs::File>>,
    line: i64,
    origin: String,
    category: String,
    filters: Filters,
    archive: Option<ArchiveHandle>,
}

impl LiveRead {
    /// Read lines until the next item to emit
    async fn next_item(&mut self) -> Option<BackendResult<Item>> {
        loop {
            let raw = match self.lines.next_line().await {
                Ok(Some(raw)) => raw,
                Ok(None) => return None,
                Err(e) => return Some(Err(BackendError::IoError(e.to_string()))),
            };
            let line = self.line;
            self.line += 1;

            if raw.trim().is_empty() || self.filters.skips_line(line) {
                continue;
            }

            let record: Value = match serde_json::from_str(&raw) {
                Ok(record) => record,
                Err(e) => {
                    return Some(Err(BackendError::ParseError(format!(
                        "line {line}: {e}"
                    ))))
                }
            };

            let item = match build_item(&self.origin, &self.category, line, record.clone()) {
                Ok(item) if self.filters.skips_item(&item) => continue,
                Ok(item) => item,
                Err(e) => return Some(Err(e)),
            };

            if let Some(archive) = &self.archive {
                let payload = json!({ "line": line, "record": record });
                if let Err(e) = archive.store(&self.category, &self.origin, payload).await {
                    return Some(Err(e.into()));
                }
            }

            return Some(Ok(item));
        }
    }
}

/// Rebuild an item from an archived response, `None` when filtered out
fn replay_item(
    response: ArchivedResponse,
    filters: &Filters,
) -> Option<BackendResult<Item>> {
    let line = match response.payload.get("line").and_then(Value::as_i64) {
        Some(line) => line,
        None => {
            return Some(Err(BackendError::ParseError(
                "archived response has no line".to_string(),
            )))
        }
    };
    if filters.skips_line(line) {
        return None;
    }

    let record = response.payload.get("record").cloned().unwrap_or(Value::Null);
    match build_item(&response.origin, &response.category, line, record) {
        Ok(item) if filters.skips_item(&item) => None,
        result => Some(result),
    }
}

#[async_trait]
impl Backend for JsonLinesBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn categories(&self) -> &[&'static str] {
        CATEGORIES
    }

    fn has_archiving(&self) -> bool {
        true
    }

    fn has_resuming(&self) -> bool {
        true
    }

    async fn fetch(
        &self,
        category: &str,
        args: &FetchArgs,
        archive: Option<ArchiveHandle>,
    ) -> BackendResult<ItemStream> {
        self.check_category(category)?;
        let origin = required_path(args)?;
        let filters = Filters::from_args(args)?;

        debug!(origin = %origin, ?filters, "Fetching items from file");

        let file = tokio::fs::File::open(&origin)
            .await
            .map_err(|e| BackendError::IoError(format!("Failed to open {origin}: {e}")))?;

        let read = LiveRead {
            lines: BufReader::new(file).lines(),
            line: 0,
            origin,
            category: category.to_string(),
            filters,
            archive,
        };

        let stream = stream::unfold(Some(read), |state| async move {
            let mut read = state?;
            match read.next_item().await {
                Some(Ok(item)) => Some((Ok(item), Some(read))),
                // Stop after the first error
                Some(Err(e)) => Some((Err(e), None)),
                None => None,
            }
        });

        Ok(Box::pin(stream))
    }

    async fn fetch_from_archive(
        &self,
        category: &str,
        args: &FetchArgs,
        archive: ArchiveHandle,
        archived_after: Option<DateTime<Utc>>,
    ) -> BackendResult<ItemStream> {
        self.check_category(category)?;
        let filters = Filters::from_args(args)?;
        // Replay every origin unless a path narrows it down
        let origin = match args.get("path") {
            Some(_) => Some(required_path(args)?),
            None => None,
        };

        debug!(origin = ?origin, ?archived_after, "Replaying items from archive");

        let responses = archive.responses(category, archived_after).await?;
        let items = responses.filter_map(move |result| {
            let item = match result {
                Ok(response) if origin.as_ref().is_some_and(|o| &response.origin != o) => None,
                Ok(response) => replay_item(response, &filters),
                Err(e) => Some(Err(e.into())),
            };
            future::ready(item)
        });

        Ok(Box::pin(items))
    }
}

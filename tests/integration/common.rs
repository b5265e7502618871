//! Shared fixtures: a scripted backend and item builders

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use collector_jobs::archive::ArchiveHandle;
use collector_jobs::backend::{
    Backend, BackendError, BackendRegistry, BackendResult, FetchArgs, ItemStream,
};
use collector_jobs::item::{Item, OFFSET_FIELD, UPDATED_ON_FIELD, UUID_FIELD};
use futures::stream;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Timestamp of the first scripted item
pub const BASE_TS: f64 = 1_700_000_000.0;

/// Error message of scripted failures
pub const FAILURE: &str = "connection reset";

/// Items with increasing timestamps and offsets
pub fn items(n: usize) -> Vec<Item> {
    (0..n)
        .map(|i| {
            Item::new()
                .with(UUID_FIELD, format!("item-{i}"))
                .with(UPDATED_ON_FIELD, BASE_TS + i as f64)
                .with(OFFSET_FIELD, i as i64)
        })
        .collect()
}

/// Arguments of one backend invocation
#[derive(Debug, Clone)]
pub struct FetchCall {
    pub args: FetchArgs,
    pub replay: bool,
}

/// Backend replaying a fixed list of items, failing on demand
///
/// Each invocation takes the next entry of the failure plan: `Some(n)`
/// yields `n` items then a transient error, `None` yields everything.
/// Once the plan is exhausted `default_failure` applies.
pub struct ScriptedBackend {
    name: String,
    archiving: bool,
    resuming: bool,
    items: Vec<Item>,
    plan: Mutex<VecDeque<Option<usize>>>,
    default_failure: Option<usize>,
    calls: Mutex<Vec<FetchCall>>,
}

impl ScriptedBackend {
    pub fn new(name: &str, items: Vec<Item>) -> Self {
        Self {
            name: name.to_string(),
            archiving: true,
            resuming: true,
            items,
            plan: Mutex::new(VecDeque::new()),
            default_failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn without_archiving(mut self) -> Self {
        self.archiving = false;
        self
    }

    pub fn without_resuming(mut self) -> Self {
        self.resuming = false;
        self
    }

    pub fn with_plan(self, plan: impl IntoIterator<Item = Option<usize>>) -> Self {
        self.plan.lock().unwrap().extend(plan);
        self
    }

    pub fn always_failing_after(mut self, n: usize) -> Self {
        self.default_failure = Some(n);
        self
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().unwrap().clone()
    }

    fn stream(&self, args: &FetchArgs, replay: bool) -> ItemStream {
        self.calls.lock().unwrap().push(FetchCall {
            args: args.clone(),
            replay,
        });

        let from_ms = args
            .get("from_date")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.timestamp_millis());
        let selected = self.items.iter().filter(|item| match (from_ms, item.updated_on()) {
            (Some(from), Some(ts)) => (ts * 1000.0).round() as i64 >= from,
            _ => true,
        });

        let failure = self
            .plan
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default_failure);

        let results: Vec<BackendResult<Item>> = match failure {
            Some(n) => selected
                .take(n)
                .cloned()
                .map(Ok)
                .chain(std::iter::once(Err(BackendError::FetchError(
                    FAILURE.to_string(),
                ))))
                .collect(),
            None => selected.cloned().map(Ok).collect(),
        };

        Box::pin(stream::iter(results))
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn categories(&self) -> &[&'static str] {
        &["item"]
    }

    fn has_archiving(&self) -> bool {
        self.archiving
    }

    fn has_resuming(&self) -> bool {
        self.resuming
    }

    async fn fetch(
        &self,
        category: &str,
        args: &FetchArgs,
        _archive: Option<ArchiveHandle>,
    ) -> BackendResult<ItemStream> {
        self.check_category(category)?;
        Ok(self.stream(args, false))
    }

    async fn fetch_from_archive(
        &self,
        category: &str,
        args: &FetchArgs,
        _archive: ArchiveHandle,
        _archived_after: Option<DateTime<Utc>>,
    ) -> BackendResult<ItemStream> {
        self.check_category(category)?;
        Ok(self.stream(args, true))
    }
}

/// Registry holding only `backend`
pub fn registry(backend: Arc<ScriptedBackend>) -> BackendRegistry {
    BackendRegistry::new().with(backend)
}

//! Items produced by backends
//!
//! An item is an open-ended JSON object. Three of its fields are
//! contractual for the job runner: the identifier, the "updated"
//! timestamp and an optional pagination offset. Everything else is
//! passed through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding the unique identifier of an item
pub const UUID_FIELD: &str = "uuid";

/// Field holding the "updated" timestamp (Unix epoch seconds)
pub const UPDATED_ON_FIELD: &str = "updated_on";

/// Field holding the optional pagination offset
pub const OFFSET_FIELD: &str = "offset";

/// Field added by the decorator with the version of this crate
pub const VERSION_FIELD: &str = "collector_version";

/// Field added by the decorator with the identifier of the owning job
pub const JOB_ID_FIELD: &str = "job_id";

/// A single item fetched from a backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item(Map<String, Value>);

impl Item {
    /// Create an empty item
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build an item from a JSON value, which must be an object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Identifier of the item, if present
    pub fn uuid(&self) -> Option<&str> {
        self.0.get(UUID_FIELD).and_then(Value::as_str)
    }

    /// "Updated" timestamp of the item in epoch seconds, if present
    pub fn updated_on(&self) -> Option<f64> {
        self.0.get(UPDATED_ON_FIELD).and_then(Value::as_f64)
    }

    /// Pagination offset carried by the item, if any
    pub fn offset(&self) -> Option<i64> {
        self.0.get(OFFSET_FIELD).and_then(Value::as_i64)
    }

    /// Get a raw field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Insert or overwrite a field
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style variant of [`Item::insert`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Borrow the underlying map
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Serialize the item to JSON bytes for the output queue
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.0)
    }
}

impl From<Map<String, Value>> for Item {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

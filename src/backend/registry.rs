//! Registry of available backends
//!
//! Maps a backend name to its implementation. The registry with the
//! built-in backends is created once and shared.

use super::{Backend, JsonLinesBackend};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Global registry with the built-in backends (loaded once)
static BUILTIN: Lazy<BackendRegistry> = Lazy::new(|| {
    let mut registry = BackendRegistry::new();
    registry.register(Arc::new(JsonLinesBackend::new()));
    registry
});

/// Registry of backends indexed by name
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, Arc<dyn Backend>>,
}

impl BackendRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry containing the built-in backends
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    /// Register a backend under its own name, replacing any previous one
    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        self.backends.insert(backend.name().to_string(), backend);
    }

    /// Builder-style variant of [`BackendRegistry::register`]
    pub fn with(mut self, backend: Arc<dyn Backend>) -> Self {
        self.register(backend);
        self
    }

    /// Find a backend by name
    pub fn find(&self, name: &str) -> Option<Arc<dyn Backend>> {
        self.backends.get(name).cloned()
    }

    /// Names of all registered backends, sorted
    pub fn names(&self) -> Vec<&str> {
        self.backends.keys().map(String::as_str).collect()
    }

    /// All registered backends, sorted by name
    pub fn backends(&self) -> impl Iterator<Item = &Arc<dyn Backend>> {
        self.backends.values()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.names())
            .finish()
    }
}

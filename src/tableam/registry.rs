//! Handler name to access method lookup.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::error::AmError;
use super::method::TableAccessMethod;

/// Registered table access methods, keyed by handler name.
#[derive(Default)]
pub struct AmRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn TableAccessMethod>>>,
}

impl AmRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `am` under its own name, replacing any previous engine of
    /// that name.
    pub fn register(&self, am: Arc<dyn TableAccessMethod>) {
        self.handlers.write().insert(am.name().to_string(), am);
    }

    /// Resolves a handler name to its access method.
    pub fn resolve(&self, handler: &str) -> Result<Arc<dyn TableAccessMethod>, AmError> {
        self.handlers
            .read()
            .get(handler)
            .cloned()
            .ok_or_else(|| AmError::UnknownHandler(handler.to_string()))
    }

    /// Names of every registered handler, sorted.
    pub fn handlers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for AmRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmRegistry")
            .field("handlers", &self.handlers())
            .finish()
    }
}

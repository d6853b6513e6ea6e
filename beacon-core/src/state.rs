//! Key/value state surface shared between subsystems

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

/// Persistence surface for flags other subsystems query without holding a
/// reference to the component that wrote them.
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value);
}

/// Process-local [`StateStore`]
#[derive(Default)]
pub struct InMemoryStateStore {
    values: RwLock<HashMap<String, Value>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored key
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl StateStore for InMemoryStateStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.values.write().insert(key.to_string(), value);
    }
}

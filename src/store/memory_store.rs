//! In-memory store

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use serde_json::Value;
use tokio::sync::broadcast;

use super::{StateStore, StoreChange, StoreError, CHANGE_CHANNEL_CAPACITY};

/// Store that lives only as long as the process.
///
/// Used by `--ephemeral` runs. It can be switched offline to exercise the
/// write-failure path.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
    offline: AtomicBool,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            entries: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
            changes,
        }
    }

    /// Make every subsequent write fail (or succeed again)
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("Failed to lock store: {}", e)))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }

        self.entries
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("Failed to lock store: {}", e)))?
            .insert(key.to_string(), value.clone());

        let _ = self.changes.send(StoreChange {
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn offline_store_rejects_writes() {
        let store = MemoryStore::new();
        store.put("k", json!("a")).expect("online put");

        store.set_offline(true);
        assert!(matches!(store.put("k", json!("b")), Err(StoreError::Unavailable(_))));
        assert_eq!(store.get("k").expect("get"), Some(json!("a")));

        store.set_offline(false);
        store.put("k", json!("c")).expect("put after recovery");
        assert_eq!(store.get("k").expect("get"), Some(json!("c")));
    }
}

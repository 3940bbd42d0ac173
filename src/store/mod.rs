//! Persistent state store
//!
//! A small durable key/value store. It is the only place observers read timer
//! state from, and it owns change notification: every successful write is
//! announced on the store's own broadcast channel.

pub mod file_store;
pub mod memory_store;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

pub use file_store::JsonFileStore;
pub use memory_store::MemoryStore;

/// Key holding the full persisted `TimerState`
pub const TIMER_STATE_KEY: &str = "timer_state";
/// Key holding the observer-facing `TimerUpdate` record
pub const TIMER_UPDATE_KEY: &str = "timer_update";

/// Capacity of the change-notification channel of each store
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A value written to the store, as seen by subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreChange {
    pub key: String,
    pub value: Value,
}

pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Overwrite `key` and notify subscribers once the write is durable
    fn put(&self, key: &str, value: Value) -> Result<(), StoreError>;

    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

//! Publishing timer snapshots to the state store

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::{
    state::{TimerState, TimerUpdate},
    store::{StateStore, StoreChange, StoreError, TIMER_STATE_KEY, TIMER_UPDATE_KEY},
};

/// Writes every timer snapshot to the store.
///
/// Observers never register here. They subscribe to the store, which fans
/// the change out to everyone.
#[derive(Clone)]
pub struct Broadcaster {
    store: Arc<dyn StateStore>,
}

impl Broadcaster {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Overwrite the persisted state and the observer record
    pub fn publish(&self, state: &TimerState) -> Result<(), StoreError> {
        self.store.put(TIMER_STATE_KEY, serde_json::to_value(state)?)?;
        self.store
            .put(TIMER_UPDATE_KEY, serde_json::to_value(state.to_update())?)?;
        debug!(
            "Published generation {} with {}s left",
            state.generation, state.remaining_seconds
        );
        Ok(())
    }

    /// Last persisted state, if any
    pub fn load(&self) -> Result<Option<TimerState>, StoreError> {
        self.store
            .get(TIMER_STATE_KEY)?
            .map(serde_json::from_value)
            .transpose()
            .map_err(StoreError::from)
    }

    /// Last observer record, as an observer would read it
    pub fn latest_update(&self) -> Result<Option<TimerUpdate>, StoreError> {
        self.store
            .get(TIMER_UPDATE_KEY)?
            .map(serde_json::from_value)
            .transpose()
            .map_err(StoreError::from)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.store.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        state::{Completion, Phase},
        store::MemoryStore,
    };

    #[test]
    fn publish_writes_state_and_update_record() {
        let store = Arc::new(MemoryStore::new());
        let broadcaster = Broadcaster::new(store.clone());
        let mut changes = broadcaster.subscribe();

        let state = TimerState {
            remaining_seconds: 0,
            phase: Phase::Finished,
            paused: false,
            last_tick_at: 9_000,
            generation: 2,
            completion: Some(Completion::Cancelled),
        };
        broadcaster.publish(&state).expect("publish");

        assert_eq!(broadcaster.load().expect("load"), Some(state.clone()));
        assert_eq!(broadcaster.latest_update().expect("update"), Some(state.to_update()));
        assert_eq!(changes.try_recv().expect("state change").key, TIMER_STATE_KEY);
        assert_eq!(changes.try_recv().expect("update change").key, TIMER_UPDATE_KEY);
    }

    #[test]
    fn empty_store_loads_nothing() {
        let broadcaster = Broadcaster::new(Arc::new(MemoryStore::new()));
        assert_eq!(broadcaster.load().expect("load"), None);
        assert_eq!(broadcaster.latest_update().expect("update"), None);
    }
}

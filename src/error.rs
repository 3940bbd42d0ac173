//! Error types for the timer service

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by the timer state machine and the service around it.
///
/// Only `InvalidDuration`, `NotRunning`, `NotPaused` and `StillRunning`
/// ever reach a caller of the command surface. `StaleCallback` is swallowed
/// by the wake path, store failures are logged and retried.
#[derive(Debug, Error)]
pub enum TimerError {
    /// `start` was called with a duration that is not a positive number of seconds
    #[error("invalid duration {0}s: a timer needs a positive number of seconds")]
    InvalidDuration(i64),

    /// A wake tagged with an old generation, or delivered after the run ended
    #[error("stale wake for generation {received} (live generation {live})")]
    StaleCallback { live: u64, received: u64 },

    #[error("no timer is running")]
    NotRunning,

    #[error("timer is not paused")]
    NotPaused,

    #[error("timer is still running, stop it before resetting")]
    StillRunning,

    #[error("state store error: {0}")]
    Store(#[from] StoreError),

    #[error("timer state lock poisoned")]
    Poisoned,
}

impl TimerError {
    /// Whether the error comes from bad caller input rather than the service itself
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            TimerError::InvalidDuration(_)
                | TimerError::NotRunning
                | TimerError::NotPaused
                | TimerError::StillRunning
        )
    }
}

//! Countdown Keeper - a countdown timer that survives host suspension
//!
//! This library keeps one authoritative countdown that is persisted on every
//! change, corrected from wall-clock time after any gap in execution, and
//! announced to observers through the state store. Completion is signalled
//! exactly once per run.

pub mod api;
pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod services;
pub mod state;
pub mod store;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use clock::{Clock, ManualClock, SystemClock};
pub use commands::{dispatch, Ack, Command};
pub use config::{Config, TimerSettings};
pub use error::TimerError;
pub use state::{AppState, TimerState};
pub use utils::signals::shutdown_signal;

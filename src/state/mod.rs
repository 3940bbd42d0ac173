//! State management module
//!
//! This module contains the timer state, the pure state machine driving it,
//! the drift corrector and the service object that owns all three.

pub mod app_state;
pub mod drift;
pub mod machine;
pub mod timer_state;

// Re-export main types
pub use app_state::AppState;
pub use drift::Correction;
pub use machine::{TimerMachine, Transition, WakeOutcome};
pub use timer_state::{Completion, Phase, TimerState, TimerSummary, TimerUpdate};

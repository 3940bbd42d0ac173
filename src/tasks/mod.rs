//! Background tasks module
//!
//! This module contains the wake scheduler and the tasks that run alongside
//! the HTTP server.

pub mod recovery;
pub mod wake_dispatch;
pub mod wake_scheduler;

// Re-export main functions
pub use recovery::{restore_timer, suspension_watch_task};
pub use wake_dispatch::wake_dispatch_task;
pub use wake_scheduler::{Wake, WakeScheduler, WakeSource};

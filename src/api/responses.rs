//! API response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::TimerState;

/// API response structure for timer command endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub timer: TimerState,
}

impl ApiResponse {
    /// Create a new API response
    pub fn new(status: &str, message: String, timer: TimerState) -> Self {
        Self {
            status: status.to_string(),
            message,
            timestamp: Utc::now(),
            timer,
        }
    }

    /// Response for a command that was applied
    pub fn ok(message: String, timer: TimerState) -> Self {
        Self::new("ok", message, timer)
    }

    /// Response for a command that was refused, with the unchanged timer
    pub fn rejected(message: String, timer: TimerState) -> Self {
        Self::new("rejected", message, timer)
    }
}

/// Body of `POST /timer/start`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StartRequest {
    pub duration: i64,
}

/// Status response with the timer snapshot and server metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub timer: TimerState,
    pub armed_generation: Option<u64>,
    pub uptime: String,
    pub timestamp: DateTime<Utc>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

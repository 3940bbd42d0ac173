//! HTTP endpoint handlers

use std::{convert::Infallible, sync::Arc};
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
};
use chrono::Utc;
use futures::stream::{self, Stream};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use crate::{
    commands::{dispatch, Ack, Command},
    error::TimerError,
    state::{AppState, TimerState, TimerUpdate},
    store::TIMER_UPDATE_KEY,
};
use super::responses::{ApiResponse, HealthResponse, StartRequest, StatusResponse};

type CommandResult = Result<Json<ApiResponse>, Response>;

/// Turn the outcome of a timer command into an HTTP response
fn respond(state: &AppState, action: &str, result: Result<TimerState, TimerError>) -> CommandResult {
    match result {
        Ok(timer) => {
            info!("{} endpoint called", action);
            Ok(Json(ApiResponse::ok(format!("Timer {}", action), timer)))
        }
        Err(e) if e.is_rejection() => {
            let status = match e {
                TimerError::InvalidDuration(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::CONFLICT,
            };
            match state.query() {
                Ok(timer) => Err((status, Json(ApiResponse::rejected(e.to_string(), timer))).into_response()),
                Err(e) => {
                    error!("Failed to read timer state: {}", e);
                    Err(StatusCode::INTERNAL_SERVER_ERROR.into_response())
                }
            }
        }
        Err(e) => {
            error!("Timer {} failed: {}", action, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

/// Handle POST /command - Route a front-end message
pub async fn command_handler(
    State(state): State<Arc<AppState>>,
    Json(command): Json<Command>,
) -> Json<Ack> {
    Json(dispatch(&state, command))
}

/// Handle POST /timer/start - Start a new countdown
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartRequest>,
) -> CommandResult {
    respond(&state, "started", state.start_timer(request.duration))
}

/// Handle POST /timer/stop - Cancel the countdown
pub async fn stop_handler(State(state): State<Arc<AppState>>) -> CommandResult {
    respond(&state, "stopped", state.stop_timer())
}

/// Handle POST /timer/pause - Pause the countdown
pub async fn pause_handler(State(state): State<Arc<AppState>>) -> CommandResult {
    respond(&state, "paused", state.pause_timer())
}

/// Handle POST /timer/resume - Resume a paused countdown
pub async fn resume_handler(State(state): State<Arc<AppState>>) -> CommandResult {
    respond(&state, "resumed", state.resume_timer())
}

/// Handle POST /timer/reset - Return a finished timer to idle
pub async fn reset_handler(State(state): State<Arc<AppState>>) -> CommandResult {
    respond(&state, "reset", state.reset_timer())
}

/// Handle GET /timer - Return the full timer snapshot
pub async fn timer_handler(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, StatusCode> {
    let timer = state.query().map_err(|e| {
        error!("Failed to get timer state: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let armed_generation = state.armed_generation().map_err(|e| {
        error!("Failed to get wake scheduler state: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(StatusResponse {
        timer,
        armed_generation,
        uptime: state.get_uptime(),
        timestamp: Utc::now(),
    }))
}

/// Handle GET /timer/update - Return the observer record as stored
pub async fn update_handler(State(state): State<Arc<AppState>>) -> Result<Json<TimerUpdate>, StatusCode> {
    match state.latest_update() {
        Ok(Some(update)) => Ok(Json(update)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("Failed to read timer update from store: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// Handle GET /events - Stream every timer update written to the store
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let changes = state.subscribe();

    let updates = stream::unfold(changes, |mut changes| async move {
        loop {
            match changes.recv().await {
                Ok(change) if change.key == TIMER_UPDATE_KEY => {
                    match Event::default().event("timer").json_data(&change.value) {
                        Ok(event) => return Some((Ok::<_, Infallible>(event), changes)),
                        Err(e) => warn!("Failed to encode timer event: {}", e),
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event stream lagged, {} store changes skipped", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(updates).keep_alive(KeepAlive::default())
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

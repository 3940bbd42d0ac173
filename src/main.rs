//! Countdown Keeper - a countdown timer that survives host suspension
//!
//! This is the main entry point for the countdown-keeper server.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use countdown_keeper::{
    api::create_router,
    clock::SystemClock,
    config::Config,
    services::SoundWorker,
    state::AppState,
    store::{JsonFileStore, MemoryStore, StateStore},
    tasks::{restore_timer, suspension_watch_task, wake_dispatch_task},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("countdown_keeper={},tower_http=info", config.log_level()))
        .init();

    info!("Starting countdown-keeper v{}", env!("CARGO_PKG_VERSION"));
    let settings = config.timer_settings();
    info!("Configuration: host={}, port={}, settings={:?}", config.host, config.port, settings);

    let store: Arc<dyn StateStore> = if config.ephemeral {
        info!("Using in-memory state store, state will not survive a restart");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(JsonFileStore::open(&config.state_file)?)
    };
    let playback = Arc::new(SoundWorker::new(config.sound_player.clone(), config.sound_file.clone()));

    // Create application state
    let (state, wake_rx) = AppState::new(store, playback, Arc::new(SystemClock), settings);
    let state = Arc::new(state);

    // Wakes must be consumed before recovery can arm new sources
    tokio::spawn(wake_dispatch_task(Arc::clone(&state), wake_rx));
    restore_timer(&state);
    tokio::spawn(suspension_watch_task(Arc::clone(&state), settings.watchdog_interval));

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /command       - Send a START_TIMER / STOP_TIMER / GET_TIMER_STATE message");
    info!("  POST /timer/start   - Start a countdown ({{\"duration\": seconds}})");
    info!("  POST /timer/stop    - Cancel the countdown");
    info!("  POST /timer/pause   - Pause the countdown");
    info!("  POST /timer/resume  - Resume the countdown");
    info!("  POST /timer/reset   - Return a finished timer to idle");
    info!("  GET  /timer         - Current timer snapshot");
    info!("  GET  /timer/update  - Latest broadcast record");
    info!("  GET  /events        - Stream of broadcast records");
    info!("  GET  /health        - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    if let Err(e) = state.shutdown() {
        tracing::error!("Failed to shut down timer cleanly: {}", e);
    }
    info!("Server shutdown complete");
    Ok(())
}

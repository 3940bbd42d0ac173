//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};

use clap::Parser;

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "countdown-keeper")]
#[command(about = "A crash-tolerant countdown timer service that survives host suspension")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// File holding the persisted timer state
    #[arg(long, default_value = "countdown-keeper.json")]
    pub state_file: PathBuf,

    /// Keep state in memory only (lost on restart)
    #[arg(long)]
    pub ephemeral: bool,

    /// Interval of the primary wake source in milliseconds
    #[arg(long, default_value = "1000")]
    pub primary_interval_ms: u64,

    /// Interval of the backup wake source in seconds
    #[arg(long, default_value = "60")]
    pub backup_interval_secs: u64,

    /// How often the suspension watchdog compares clocks, in seconds
    #[arg(long, default_value = "5")]
    pub watchdog_secs: u64,

    /// Program used to play the completion sound
    #[arg(long, default_value = "paplay")]
    pub sound_player: String,

    /// Sound file passed to the player
    #[arg(long)]
    pub sound_file: Option<PathBuf>,

    /// Give up on the completion sound after this many seconds
    #[arg(long, default_value = "10")]
    pub playback_timeout_secs: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Timing knobs handed to the timer service
    pub fn timer_settings(&self) -> TimerSettings {
        TimerSettings {
            primary_interval: Duration::from_millis(self.primary_interval_ms.max(1)),
            backup_interval: Duration::from_secs(self.backup_interval_secs.max(1)),
            watchdog_interval: Duration::from_secs(self.watchdog_secs.max(1)),
            playback_timeout: Duration::from_secs(self.playback_timeout_secs),
        }
    }
}

/// Timing configuration of the timer service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSettings {
    pub primary_interval: Duration,
    pub backup_interval: Duration,
    pub watchdog_interval: Duration,
    pub playback_timeout: Duration,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            primary_interval: Duration::from_secs(1),
            backup_interval: Duration::from_secs(60),
            watchdog_interval: Duration::from_secs(5),
            playback_timeout: Duration::from_secs(10),
        }
    }
}

//! Completion sound delegate
//!
//! The sound is played by a separate worker task that may not exist yet when
//! a countdown finishes. The service provisions it on demand, sends it a
//! single `PLAY_SOUND` message and waits for a `{success}` reply. Nothing here
//! can fail a timer: the caller logs errors and moves on.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    process::Command,
    sync::{mpsc, oneshot, Mutex},
};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The host refused to create the playback context
    #[error("playback context could not be provisioned: {0}")]
    Provision(String),

    #[error("playback context is not running")]
    Unavailable,

    #[error("playback failed: {0}")]
    Failed(String),
}

/// Message understood by the playback context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackMessage {
    PlaySound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackReply {
    pub success: bool,
}

/// Capability the timer service needs from whatever plays the alert
#[async_trait]
pub trait PlaybackDelegate: Send + Sync {
    /// Create the playback context if it is not already running
    async fn ensure_provisioned(&self) -> Result<(), PlaybackError>;

    /// Ask the context to play the completion sound
    async fn play(&self) -> Result<PlaybackReply, PlaybackError>;
}

struct Envelope {
    message: PlaybackMessage,
    reply: oneshot::Sender<PlaybackReply>,
}

/// Delegate that runs an external player command on a lazily spawned worker
pub struct SoundWorker {
    player: String,
    sound_file: Option<PathBuf>,
    worker: Mutex<Option<mpsc::Sender<Envelope>>>,
}

impl SoundWorker {
    pub fn new(player: impl Into<String>, sound_file: Option<PathBuf>) -> Self {
        Self {
            player: player.into(),
            sound_file,
            worker: Mutex::new(None),
        }
    }

    fn spawn_worker(program: PathBuf, sound_file: Option<PathBuf>) -> mpsc::Sender<Envelope> {
        let (tx, mut rx) = mpsc::channel::<Envelope>(8);

        tokio::spawn(async move {
            info!("Playback worker started ({})", program.display());
            while let Some(envelope) = rx.recv().await {
                let success = match envelope.message {
                    PlaybackMessage::PlaySound => {
                        run_player(&program, sound_file.as_ref()).await
                    }
                };
                if envelope.reply.send(PlaybackReply { success }).is_err() {
                    debug!("Playback requester went away before the reply");
                }
            }
            info!("Playback worker stopped");
        });

        tx
    }
}

async fn run_player(program: &Path, sound_file: Option<&PathBuf>) -> bool {
    let mut command = Command::new(program);
    if let Some(file) = sound_file {
        command.arg(file);
    }

    match command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
    {
        Ok(output) if output.status.success() => true,
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("{} exited with {}: {}", program.display(), output.status, stderr.trim());
            false
        }
        Err(e) => {
            warn!("Failed to execute {}: {}", program.display(), e);
            false
        }
    }
}

#[async_trait]
impl PlaybackDelegate for SoundWorker {
    async fn ensure_provisioned(&self) -> Result<(), PlaybackError> {
        let mut worker = self.worker.lock().await;
        if worker.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return Ok(());
        }

        let program = which::which(&self.player)
            .map_err(|e| PlaybackError::Provision(format!("{}: {}", self.player, e)))?;
        *worker = Some(Self::spawn_worker(program, self.sound_file.clone()));
        Ok(())
    }

    async fn play(&self) -> Result<PlaybackReply, PlaybackError> {
        let tx = self
            .worker
            .lock()
            .await
            .clone()
            .ok_or(PlaybackError::Unavailable)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(Envelope {
            message: PlaybackMessage::PlaySound,
            reply: reply_tx,
        })
        .await
        .map_err(|_| PlaybackError::Unavailable)?;

        reply_rx
            .await
            .map_err(|_| PlaybackError::Failed("worker dropped the request".to_string()))
    }
}

//! Collaborators of the timer service
//!
//! This module contains the broadcast layer that publishes snapshots to the
//! state store and the delegate that plays the completion sound.

pub mod broadcast;
pub mod playback;

// Re-export main types
pub use broadcast::Broadcaster;
pub use playback::{PlaybackDelegate, PlaybackError, PlaybackMessage, PlaybackReply, SoundWorker};

//! Error types for playback control

use crate::command::Command;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Playback errors
///
/// Command-level errors (`InvalidCommand`, `InvalidPlayingItemRemoval`,
/// `IndexOutOfBounds`) are returned synchronously to the caller and never
/// touch the player status. Everything the engine or the OS reports is
/// carried inside [`PlayerStatus::Failed`](crate::PlayerStatus::Failed) or
/// [`PlayerStatus::Critical`](crate::PlayerStatus::Critical) instead.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum PlaybackError {
    /// The capability predicate rejected the command
    #[error("Invalid command: {0:?}")]
    InvalidCommand(Command),

    /// The currently playing queue entry cannot be removed
    #[error("Cannot remove the item that is currently playing")]
    InvalidPlayingItemRemoval,

    /// Queue position out of bounds
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// Desired playback rate must be a positive multiplier
    #[error("Invalid playback rate: {0}")]
    InvalidRate(f32),

    /// An engine instance that should exist was gone
    #[error("Engine unavailable")]
    EngineUnavailable,

    /// The controller task has shut down
    #[error("Playback controller is closed")]
    ControllerClosed,

    /// Loading the asset behind an item failed
    #[error("Failed to load item: {0}")]
    ItemLoadFailed(String),

    /// Loading did not finish in time
    #[error("Loading timed out after {0:?}")]
    LoadTimedOut(Duration),

    /// The engine appended an entry to the item's error log
    #[error("Playback error: {0}")]
    ItemPlaybackError(String),

    /// Playback stalled and could not be kicked back into motion
    #[error("Playback stalled")]
    PlaybackStalled,

    /// The item stopped before reaching its end
    #[error("Failed to play to end: {0}")]
    FailedToPlayToEnd(String),

    /// A failed-to-play-to-end signal arrived without its reason
    #[error("Malformed end-of-track signal: {0}")]
    EndOfTrackSignalMalformed(String),

    /// The engine itself failed and playback was torn down
    #[error("Engine failure: {0}")]
    EngineFatal(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;

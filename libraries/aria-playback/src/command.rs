//! Transport commands

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Transport command accepted by the playback controller
///
/// Every command is gated by its capability predicate before it runs
/// (see [`crate::capability`]).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Command {
    /// Start or resume the item at the current index
    Play,

    /// Start the item at `index`
    PlayAt { index: usize },

    /// Advance to the next item
    Next,

    /// Go back one item, or rewind the current one when past the first second
    Previous,

    /// Pause playback
    Pause,

    /// Pause and discard the engine instance
    Stop,

    /// Move to `position`, optionally starting playback right away
    Seek { position: Duration, should_play: bool },

    /// Move relative to the current position (negative goes back)
    Skip { seconds: i64 },

    /// Pause and rewind to the head of the queue
    Restart,

    /// Load the current item without playing it
    Prefetch,
}

impl Command {
    /// Seek to a whole number of seconds
    pub fn seek_to_secs(seconds: u64, should_play: bool) -> Self {
        Command::Seek {
            position: Duration::from_secs(seconds),
            should_play,
        }
    }
}

// Seeks compare by target only: a seek that also starts playback is the
// same command as far as gating is concerned.
impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Command::Play, Command::Play)
            | (Command::Next, Command::Next)
            | (Command::Previous, Command::Previous)
            | (Command::Pause, Command::Pause)
            | (Command::Stop, Command::Stop)
            | (Command::Restart, Command::Restart)
            | (Command::Prefetch, Command::Prefetch) => true,
            (Command::PlayAt { index: l }, Command::PlayAt { index: r }) => l == r,
            (Command::Seek { position: l, .. }, Command::Seek { position: r, .. }) => l == r,
            (Command::Skip { seconds: l }, Command::Skip { seconds: r }) => l == r,
            _ => false,
        }
    }
}

impl Eq for Command {}

/// Where a command came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandOrigin {
    /// Issued by the application (UI, catalog)
    User,

    /// Issued by a hardware or OS remote-control button
    Remote,

    /// Self-issued by the controller in reaction to an engine or OS event
    Auto,
}

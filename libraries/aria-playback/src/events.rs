//! Playback events
//!
//! Broadcast to observers whenever derived state changes:
//! - Status, index and queue changes
//! - Mode and rate changes
//! - Capability flags (drives UI and hardware button enablement)
//! - Now-playing snapshots

use crate::capability::Capabilities;
use crate::command::{Command, CommandOrigin};
use crate::error::PlaybackError;
use crate::now_playing::NowPlayingInfo;
use crate::types::{PlayerStatus, RemoteControlMode, RepeatMode, ShuffleMode};
use serde::Serialize;

/// Events emitted by the playback controller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PlaybackEvent {
    /// Status changed (never emitted for a no-op transition)
    StatusChanged {
        status: PlayerStatus,
    },

    /// Play index moved
    IndexChanged {
        index: usize,
    },

    /// Queue contents changed
    QueueChanged {
        length: usize,
    },

    ShuffleChanged {
        mode: ShuffleMode,
    },

    RepeatChanged {
        mode: RepeatMode,
    },

    RemoteControlChanged {
        mode: RemoteControlMode,
    },

    /// Desired playback rate changed
    RateChanged {
        rate: f32,
    },

    CapabilitiesChanged {
        capabilities: Capabilities,
    },

    /// New now-playing snapshot; `None` when nothing is current
    NowPlayingChanged {
        info: Option<NowPlayingInfo>,
    },

    /// A stall was detected while playing and playback was restarted
    PlaybackRecovered,

    /// A command failed its capability check
    CommandRejected {
        command: Command,
        origin: CommandOrigin,
        error: PlaybackError,
    },
}

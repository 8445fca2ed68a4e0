//! Core types for playback control

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Player status
///
/// Mutated only by the controller. Consumers learn about engine and OS
/// failures by watching for `Failed` and `Critical`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum PlayerStatus {
    /// Idle, nothing loaded or playback stopped
    #[default]
    Ready,

    /// Waiting for an item to load or buffer
    Loading,

    /// Currently playing
    Playing,

    /// Paused mid-item
    Paused,

    /// Current item prefetched, not yet started
    ReadyToPlay,

    /// Transient failure; re-issuing a command may recover
    Failed(PlaybackError),

    /// Fatal failure; playback has been forced to stop
    Critical(PlaybackError),
}

impl PlayerStatus {
    /// Check if the status carries an error
    pub fn is_error(&self) -> bool {
        matches!(self, PlayerStatus::Failed(_) | PlayerStatus::Critical(_))
    }
}

/// Shuffle mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShuffleMode {
    /// Play in insertion order
    #[default]
    Off,

    /// Randomize songs around the current one
    Songs,
}

/// Repeat mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop when the queue ends
    #[default]
    None,

    /// Loop the current item
    One,

    /// Loop the entire queue
    All,
}

/// Which remote-control buttons are registered with the OS
///
/// The two sets are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RemoteControlMode {
    /// Next/previous track buttons
    #[default]
    MoveTrack,

    /// Skip forward/backward buttons with the given interval in seconds
    SkipBySeconds(u32),
}

/// Configuration for the playback controller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Let the engine delay playback to minimize stalling (default: false)
    pub automatically_waits_to_minimize_stalling: bool,

    /// Initial desired playback rate (default: 1.0)
    pub desired_rate: f32,

    /// Initial shuffle mode (default: Off)
    pub shuffle: ShuffleMode,

    /// Initial repeat mode (default: None)
    pub repeat: RepeatMode,

    /// Initial remote-control mode (default: MoveTrack)
    pub remote_control: RemoteControlMode,

    /// Give up on a load after this many milliseconds (default: 30000, `None` waits forever)
    pub load_timeout_ms: Option<u64>,

    /// Capacity of the event broadcast channel (default: 64)
    pub event_capacity: usize,
}

impl PlayerConfig {
    /// Load timeout as a duration
    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_ms.map(Duration::from_millis)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.desired_rate.is_finite() && self.desired_rate > 0.0) {
            return Err(PlaybackError::InvalidRate(self.desired_rate));
        }
        if self.event_capacity == 0 {
            return Err(PlaybackError::InvalidConfig(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        if self.load_timeout_ms == Some(0) {
            return Err(PlaybackError::InvalidConfig(
                "load_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            automatically_waits_to_minimize_stalling: false,
            desired_rate: 1.0,
            shuffle: ShuffleMode::Off,
            repeat: RepeatMode::None,
            remote_control: RemoteControlMode::MoveTrack,
            load_timeout_ms: Some(30_000),
            event_capacity: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PlayerConfig::default();
        assert!(!config.automatically_waits_to_minimize_stalling);
        assert_eq!(config.desired_rate, 1.0);
        assert_eq!(config.shuffle, ShuffleMode::Off);
        assert_eq!(config.repeat, RepeatMode::None);
        assert_eq!(config.remote_control, RemoteControlMode::MoveTrack);
        assert_eq!(config.load_timeout(), Some(Duration::from_secs(30)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_rate() {
        let config = PlayerConfig {
            desired_rate: 0.0,
            ..PlayerConfig::default()
        };
        assert_eq!(config.validate(), Err(PlaybackError::InvalidRate(0.0)));

        let config = PlayerConfig {
            desired_rate: f32::NAN,
            ..PlayerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_capacity() {
        let config = PlayerConfig {
            event_capacity: 0,
            ..PlayerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PlaybackError::InvalidConfig(_))
        ));
    }

    #[test]
    fn failed_statuses_compare_by_error() {
        let a = PlayerStatus::Failed(PlaybackError::ItemLoadFailed("a".into()));
        let b = PlayerStatus::Failed(PlaybackError::ItemLoadFailed("b".into()));
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
        assert!(a.is_error());
        assert!(!PlayerStatus::Paused.is_error());
    }
}

//! OS and hardware adapter interfaces
//!
//! Three things come from the operating system: session notifications
//! (interruptions, route changes), remote-control button presses, and the
//! now-playing surface. The first two arrive as values on channels; the
//! button registry and the now-playing surface are traits the runtime
//! calls into.

use crate::capability::Capabilities;
use crate::command::Command;
use crate::now_playing::NowPlayingInfo;
use crate::types::{PlayerStatus, RemoteControlMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Why the audio route changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteChangeReason {
    Unknown,
    NewDeviceAvailable,
    /// Headphones unplugged, Bluetooth device gone, ...
    OldDeviceUnavailable,
    CategoryChange,
    Override,
}

/// Audio-session notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    InterruptionBegan,
    InterruptionEnded { should_resume: bool },
    RouteChanged(RouteChangeReason),
}

/// A remote-control button the player can register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemoteButton {
    Play,
    Pause,
    TogglePlayPause,
    NextTrack,
    PreviousTrack,
    SkipForward,
    SkipBackward,
    ChangePlaybackPosition,
}

/// A remote-control button press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteEvent {
    Play,
    Pause,
    TogglePlayPause,
    NextTrack,
    PreviousTrack,
    SkipForward,
    SkipBackward,
    ChangePlaybackPosition(Duration),
}

const ALWAYS_REGISTERED: [RemoteButton; 4] = [
    RemoteButton::Play,
    RemoteButton::Pause,
    RemoteButton::TogglePlayPause,
    RemoteButton::ChangePlaybackPosition,
];

/// Buttons registered under `mode`
pub fn buttons_for(mode: RemoteControlMode) -> Vec<RemoteButton> {
    let mut buttons = ALWAYS_REGISTERED.to_vec();
    match mode {
        RemoteControlMode::MoveTrack => {
            buttons.extend([RemoteButton::NextTrack, RemoteButton::PreviousTrack]);
        }
        RemoteControlMode::SkipBySeconds(_) => {
            buttons.extend([RemoteButton::SkipForward, RemoteButton::SkipBackward]);
        }
    }
    buttons
}

/// Translate a button press into a command
///
/// Skip presses outside skip mode come from a stale registration and are
/// dropped.
pub fn command_for(
    event: RemoteEvent,
    status: &PlayerStatus,
    mode: RemoteControlMode,
) -> Option<Command> {
    match event {
        RemoteEvent::Play => Some(Command::Play),
        RemoteEvent::Pause => Some(Command::Pause),
        RemoteEvent::TogglePlayPause => {
            if matches!(status, PlayerStatus::Playing) {
                Some(Command::Pause)
            } else {
                Some(Command::Play)
            }
        }
        RemoteEvent::NextTrack => Some(Command::Next),
        RemoteEvent::PreviousTrack => Some(Command::Previous),
        RemoteEvent::SkipForward | RemoteEvent::SkipBackward => match mode {
            RemoteControlMode::SkipBySeconds(n) => {
                let seconds = i64::from(n);
                Some(Command::Skip {
                    seconds: if event == RemoteEvent::SkipForward {
                        seconds
                    } else {
                        -seconds
                    },
                })
            }
            RemoteControlMode::MoveTrack => None,
        },
        RemoteEvent::ChangePlaybackPosition(position) => Some(Command::Seek {
            position,
            should_play: false,
        }),
    }
}

/// Whether `button` should be enabled given `caps`
pub fn button_enabled(button: RemoteButton, caps: &Capabilities) -> bool {
    match button {
        RemoteButton::Play => caps.play,
        RemoteButton::Pause => caps.pause,
        RemoteButton::TogglePlayPause => caps.play || caps.pause,
        RemoteButton::NextTrack => caps.next,
        RemoteButton::PreviousTrack => caps.previous,
        RemoteButton::SkipForward => caps.skip_forward,
        RemoteButton::SkipBackward => caps.skip_backward,
        RemoteButton::ChangePlaybackPosition => caps.seek,
    }
}

/// OS remote-control registry
#[cfg_attr(test, mockall::automock)]
pub trait RemoteCommandCenter: Send {
    /// Start receiving presses of `button`; skip buttons carry their interval
    fn register(&mut self, button: RemoteButton, preferred_interval: Option<u32>);

    fn unregister(&mut self, button: RemoteButton);

    fn set_enabled(&mut self, button: RemoteButton, enabled: bool);
}

/// OS now-playing surface
#[cfg_attr(test, mockall::automock)]
pub trait NowPlayingCenter: Send {
    fn publish(&mut self, info: &NowPlayingInfo);

    fn clear(&mut self);
}

/// Keeps the OS button registry in line with the mode and capabilities
///
/// Only differences are pushed to the registry.
#[derive(Debug, Default)]
pub struct RemoteButtons {
    mode: Option<RemoteControlMode>,
    enabled: HashMap<RemoteButton, bool>,
}

impl RemoteButtons {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the set for `mode` (swapping out the previous set) and
    /// update enablement from `caps`
    pub fn sync(
        &mut self,
        center: &mut dyn RemoteCommandCenter,
        mode: RemoteControlMode,
        caps: &Capabilities,
    ) {
        if self.mode != Some(mode) {
            if let Some(old) = self.mode {
                for button in buttons_for(old) {
                    center.unregister(button);
                }
            }
            debug!("Registering remote buttons for {:?}", mode);
            let interval = match mode {
                RemoteControlMode::SkipBySeconds(n) => Some(n),
                RemoteControlMode::MoveTrack => None,
            };
            for button in buttons_for(mode) {
                let preferred = match button {
                    RemoteButton::SkipForward | RemoteButton::SkipBackward => interval,
                    _ => None,
                };
                center.register(button, preferred);
            }
            self.mode = Some(mode);
            self.enabled.clear();
        }

        for button in buttons_for(mode) {
            let enabled = button_enabled(button, caps);
            if self.enabled.get(&button) != Some(&enabled) {
                center.set_enabled(button, enabled);
                self.enabled.insert(button, enabled);
            }
        }
    }

    /// Unregister every button
    pub fn teardown(&mut self, center: &mut dyn RemoteCommandCenter) {
        if let Some(mode) = self.mode.take() {
            for button in buttons_for(mode) {
                center.unregister(button);
            }
        }
        self.enabled.clear();
    }
}

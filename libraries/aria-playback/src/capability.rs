//! Capability predicates
//!
//! Pure functions deciding whether a command may currently run. The
//! controller uses them to gate every command; the runtime uses the
//! aggregated [`Capabilities`] to enable and disable remote buttons.

use crate::command::Command;
use crate::types::PlayerStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Past this much elapsed time, `previous` rewinds instead of moving back
pub const PREVIOUS_RESTART_THRESHOLD: Duration = Duration::from_secs(1);

/// Skip interval advertised when no skip mode is configured
pub const DEFAULT_SKIP_INTERVAL: u32 = 15;

/// Read-only inputs of the predicates
#[derive(Debug, Clone, Copy)]
pub struct PlayerView<'a> {
    pub status: &'a PlayerStatus,
    pub queue_len: usize,
    pub index: usize,
    pub has_instance: bool,
    pub elapsed: Option<Duration>,
    pub duration: Option<Duration>,
}

impl PlayerView<'_> {
    fn is_busy(&self) -> bool {
        matches!(self.status, PlayerStatus::Loading | PlayerStatus::Playing)
    }
}

pub fn can_play(view: &PlayerView<'_>) -> bool {
    !view.is_busy()
}

pub fn can_play_at(view: &PlayerView<'_>) -> bool {
    !matches!(view.status, PlayerStatus::Loading)
}

pub fn can_pause(view: &PlayerView<'_>) -> bool {
    view.is_busy()
}

pub fn can_next(view: &PlayerView<'_>) -> bool {
    view.index + 1 < view.queue_len
}

pub fn can_previous(view: &PlayerView<'_>) -> bool {
    view.index > 0 || view.elapsed.is_some_and(|t| t > PREVIOUS_RESTART_THRESHOLD)
}

pub fn can_seek(view: &PlayerView<'_>) -> bool {
    view.has_instance
        && matches!(
            view.status,
            PlayerStatus::Ready | PlayerStatus::Playing | PlayerStatus::Paused
        )
}

pub fn can_prefetch(view: &PlayerView<'_>) -> bool {
    !view.is_busy()
}

/// Where a relative skip lands
///
/// Past the end of the item it becomes `Next`, at or before its start it
/// becomes `Previous`, anything in between is a plain seek. `None` when the
/// elapsed time or the duration is unknown.
pub fn skip_target(view: &PlayerView<'_>, seconds: i64) -> Option<Command> {
    let elapsed = view.elapsed?;
    let duration = view.duration?;

    let projected = elapsed.as_secs_f64() + seconds as f64;
    if projected >= duration.as_secs_f64() {
        Some(Command::Next)
    } else if projected <= 0.0 {
        Some(Command::Previous)
    } else {
        Some(Command::Seek {
            position: Duration::from_secs_f64(projected),
            should_play: false,
        })
    }
}

pub fn can_skip(view: &PlayerView<'_>, seconds: i64) -> bool {
    match skip_target(view, seconds) {
        Some(Command::Next) => can_next(view),
        Some(Command::Previous) => can_previous(view),
        Some(_) => can_seek(view),
        None => false,
    }
}

/// Whether `command` may run right now
pub fn can_send(view: &PlayerView<'_>, command: &Command) -> bool {
    match command {
        Command::Play => can_play(view),
        Command::PlayAt { .. } => can_play_at(view),
        Command::Next => can_next(view),
        Command::Previous => can_previous(view),
        Command::Pause => can_pause(view),
        Command::Stop | Command::Restart => true,
        Command::Seek { .. } => can_seek(view),
        Command::Skip { seconds } => can_skip(view, *seconds),
        Command::Prefetch => can_prefetch(view),
    }
}

/// Every predicate evaluated at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Capabilities {
    pub play: bool,
    pub pause: bool,
    pub next: bool,
    pub previous: bool,
    pub seek: bool,
    pub skip_forward: bool,
    pub skip_backward: bool,
    pub stop: bool,
    pub restart: bool,
    pub prefetch: bool,
    /// Interval the skip flags were evaluated with, in seconds
    pub skip_interval: u32,
}

impl Capabilities {
    pub fn evaluate(view: &PlayerView<'_>, skip_interval: u32) -> Self {
        let interval = i64::from(skip_interval);
        Self {
            play: can_play(view),
            pause: can_pause(view),
            next: can_next(view),
            previous: can_previous(view),
            seek: can_seek(view),
            skip_forward: can_skip(view, interval),
            skip_backward: can_skip(view, -interval),
            stop: true,
            restart: true,
            prefetch: can_prefetch(view),
            skip_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlaybackError;

    fn view(status: &PlayerStatus) -> PlayerView<'_> {
        PlayerView {
            status,
            queue_len: 3,
            index: 0,
            has_instance: true,
            elapsed: Some(Duration::ZERO),
            duration: Some(Duration::from_secs(30)),
        }
    }

    #[test]
    fn play_and_pause_are_exclusive_while_busy() {
        for status in [PlayerStatus::Loading, PlayerStatus::Playing] {
            let v = view(&status);
            assert!(!can_play(&v));
            assert!(can_pause(&v));
        }
        for status in [
            PlayerStatus::Ready,
            PlayerStatus::Paused,
            PlayerStatus::ReadyToPlay,
            PlayerStatus::Failed(PlaybackError::PlaybackStalled),
        ] {
            let v = view(&status);
            assert!(can_play(&v));
            assert!(!can_pause(&v));
        }
    }

    #[test]
    fn play_at_blocked_only_while_loading() {
        assert!(!can_play_at(&view(&PlayerStatus::Loading)));
        assert!(can_play_at(&view(&PlayerStatus::Playing)));
    }

    #[test]
    fn next_needs_a_following_item() {
        let status = PlayerStatus::Playing;
        let mut v = view(&status);
        v.index = 1;
        assert!(can_next(&v));
        v.index = 2;
        assert!(!can_next(&v));
    }

    #[test]
    fn previous_threshold_is_strict() {
        let status = PlayerStatus::Playing;
        let mut v = view(&status);
        v.elapsed = Some(Duration::from_secs(1));
        assert!(!can_previous(&v));
        v.elapsed = Some(Duration::from_millis(1001));
        assert!(can_previous(&v));
        v.elapsed = Some(Duration::ZERO);
        v.index = 1;
        assert!(can_previous(&v));
    }

    #[test]
    fn seek_needs_instance_and_settled_status() {
        let status = PlayerStatus::Paused;
        let mut v = view(&status);
        assert!(can_seek(&v));
        v.has_instance = false;
        assert!(!can_seek(&v));

        assert!(!can_seek(&view(&PlayerStatus::Loading)));
        assert!(!can_seek(&view(&PlayerStatus::ReadyToPlay)));
    }

    #[test]
    fn skip_past_end_is_next() {
        let status = PlayerStatus::Playing;
        let mut v = view(&status);
        v.elapsed = Some(Duration::from_secs(25));
        assert_eq!(skip_target(&v, 20), Some(Command::Next));
        assert!(can_skip(&v, 20));

        v.index = 2;
        assert!(!can_skip(&v, 20));
    }

    #[test]
    fn skip_before_start_is_previous() {
        let status = PlayerStatus::Playing;
        let mut v = view(&status);
        v.elapsed = Some(Duration::from_secs(5));
        assert_eq!(skip_target(&v, -10), Some(Command::Previous));
        // index 0 and elapsed 5s > 1s: previous rewinds
        assert!(can_skip(&v, -10));
    }

    #[test]
    fn skip_within_item_is_seek() {
        let status = PlayerStatus::Playing;
        let mut v = view(&status);
        v.elapsed = Some(Duration::from_secs(10));
        assert_eq!(
            skip_target(&v, 5),
            Some(Command::seek_to_secs(15, false))
        );
        assert!(can_skip(&v, 5));
    }

    #[test]
    fn skip_with_unknown_timing_is_refused() {
        let status = PlayerStatus::Playing;
        let mut v = view(&status);
        v.duration = None;
        assert!(!can_skip(&v, 5));
        v.duration = Some(Duration::from_secs(30));
        v.elapsed = None;
        assert!(!can_skip(&v, 5));
    }

    #[test]
    fn evaluate_collects_all_flags() {
        let status = PlayerStatus::Ready;
        let caps = Capabilities::evaluate(&view(&status), DEFAULT_SKIP_INTERVAL);
        assert!(caps.play);
        assert!(!caps.pause);
        assert!(caps.next);
        assert!(!caps.previous);
        assert!(caps.seek);
        assert!(caps.skip_forward);
        assert!(!caps.skip_backward);
        assert!(caps.stop && caps.restart && caps.prefetch);
        assert_eq!(caps.skip_interval, 15);
    }

    #[test]
    fn stop_and_restart_always_allowed() {
        let status = PlayerStatus::Loading;
        let v = view(&status);
        assert!(can_send(&v, &Command::Stop));
        assert!(can_send(&v, &Command::Restart));
        assert!(!can_send(&v, &Command::Prefetch));
    }
}

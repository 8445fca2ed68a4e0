//! Now-playing telemetry and timing display helpers

use crate::item::{Artwork, MediaItem};
use crate::types::PlayerStatus;
use serde::Serialize;
use std::time::Duration;

/// Placeholder for a time that is not known yet
pub const UNKNOWN_TIME: &str = "--:--";

/// Snapshot published to the OS now-playing surface
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NowPlayingInfo {
    pub title: String,
    pub duration: Option<Duration>,
    pub elapsed: Option<Duration>,
    pub queue_count: usize,
    pub queue_index: usize,
    /// Zero while paused, the desired rate otherwise
    pub rate: f32,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub lyrics: Option<String>,
    #[serde(skip)]
    pub artwork: Option<Artwork>,
}

impl NowPlayingInfo {
    pub fn compose(
        item: &MediaItem,
        status: &PlayerStatus,
        elapsed: Option<Duration>,
        queue_count: usize,
        queue_index: usize,
        desired_rate: f32,
    ) -> Self {
        let meta = item.meta();
        let rate = if matches!(status, PlayerStatus::Paused) {
            0.0
        } else {
            desired_rate
        };

        Self {
            title: meta.title.unwrap_or_default(),
            duration: meta.duration,
            elapsed,
            queue_count,
            queue_index,
            rate,
            artist: meta.artist,
            album: meta.album,
            lyrics: meta.lyrics,
            artwork: meta.artwork,
        }
    }
}

/// Format as `m:ss`
pub fn format_time(time: Duration) -> String {
    let total = time.as_secs();
    format!("{}:{:02}", total / 60, total % 60)
}

/// Format an optional time, falling back to `--:--`
pub fn format_optional(time: Option<Duration>) -> String {
    time.map_or_else(|| UNKNOWN_TIME.to_string(), format_time)
}

/// Time left in the item
///
/// Unknown without a duration. Without an elapsed time the whole
/// duration is left.
pub fn remaining(duration: Option<Duration>, elapsed: Option<Duration>) -> Option<Duration> {
    let duration = duration?;
    Some(elapsed.map_or(duration, |elapsed| duration.saturating_sub(elapsed)))
}

/// Buffered share of the item, `buffered_end / duration`
pub fn buffered_progress(duration: Option<Duration>, buffered_end: Option<Duration>) -> Option<f32> {
    let duration = duration?.as_secs_f64();
    let end = buffered_end?.as_secs_f64();
    if duration <= 0.0 {
        return None;
    }
    Some((end / duration) as f32)
}

/// Terminal stand-ins for the OS now-playing and remote-control surfaces
use aria_playback::now_playing::{format_optional, remaining};
use aria_playback::{NowPlayingCenter, NowPlayingInfo, RemoteButton, RemoteCommandCenter};
use tracing::{debug, info};

/// Logs the now-playing item; position updates go to debug
#[derive(Debug, Default)]
pub struct LogNowPlaying {
    last: Option<(String, usize)>,
}

impl NowPlayingCenter for LogNowPlaying {
    fn publish(&mut self, info: &NowPlayingInfo) {
        let key = (info.title.clone(), info.queue_index);
        let progress = format!(
            "{} / {} (-{})",
            format_optional(info.elapsed),
            format_optional(info.duration),
            format_optional(remaining(info.duration, info.elapsed)),
        );

        if self.last.as_ref() == Some(&key) {
            debug!("{} {} x{}", info.title, progress, info.rate);
            return;
        }
        info!(
            "Now playing [{}/{}]: {} - {} ({}) {}",
            info.queue_index + 1,
            info.queue_count,
            info.title,
            info.artist.as_deref().unwrap_or("?"),
            info.album.as_deref().unwrap_or("?"),
            progress
        );
        if let Some(lyrics) = &info.lyrics {
            debug!("Lyrics:\n{}", lyrics);
        }
        self.last = Some(key);
    }

    fn clear(&mut self) {
        info!("Now playing cleared");
        self.last = None;
    }
}

/// Records which buttons a media-key integration would expose
#[derive(Debug, Default)]
pub struct LogRemote;

impl RemoteCommandCenter for LogRemote {
    fn register(&mut self, button: RemoteButton, preferred_interval: Option<u32>) {
        match preferred_interval {
            Some(secs) => debug!("Remote {:?} registered ({}s)", button, secs),
            None => debug!("Remote {:?} registered", button),
        }
    }

    fn unregister(&mut self, button: RemoteButton) {
        debug!("Remote {:?} unregistered", button);
    }

    fn set_enabled(&mut self, button: RemoteButton, enabled: bool) {
        debug!("Remote {:?} {}", button, if enabled { "enabled" } else { "disabled" });
    }
}

//! Clock-driven stand-in for a real audio engine
//!
//! Nothing is decoded. Each instance runs a ticker task that advances a
//! position at the current rate and reports it, and signals end of track
//! once the item's duration is reached.

use aria_playback::{
    EngineEvent, EngineEventSink, EngineInstance, InstanceOptions, ItemStatus, MediaEngine,
    MediaItem, PlaybackError, Result,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

#[derive(Debug, Default)]
struct Clock {
    position: Duration,
    rate: f32,
    ended: bool,
}

#[derive(Debug, Clone, Default)]
struct SharedClock(Arc<Mutex<Clock>>);

impl SharedClock {
    fn lock(&self) -> MutexGuard<'_, Clock> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Engine whose instances play silence in real time
#[derive(Debug, Clone)]
pub struct SimulatedEngine {
    tick: Duration,
}

impl SimulatedEngine {
    pub fn new(tick: Duration) -> Self {
        Self { tick }
    }
}

#[async_trait]
impl MediaEngine for SimulatedEngine {
    async fn load(&self, item: &MediaItem) -> Result<()> {
        match tokio::fs::metadata(item.locator()).await {
            Ok(meta) if meta.is_file() => Ok(()),
            Ok(_) => Err(PlaybackError::ItemLoadFailed(format!(
                "{} is not a file",
                item.locator()
            ))),
            Err(e) => Err(PlaybackError::ItemLoadFailed(format!(
                "{}: {}",
                item.locator(),
                e
            ))),
        }
    }

    fn create_instance(
        &self,
        item: &MediaItem,
        options: InstanceOptions,
        events: EngineEventSink,
    ) -> Result<Box<dyn EngineInstance>> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| PlaybackError::EngineUnavailable)?;
        debug!(
            "Creating {} for {} ({:?})",
            events.instance(),
            item.locator(),
            options
        );

        let clock = SharedClock::default();
        let ticker = runtime.spawn(tick(item.clone(), clock.clone(), events, self.tick));
        Ok(Box::new(SimulatedInstance { clock, ticker }))
    }
}

async fn tick(item: MediaItem, clock: SharedClock, events: EngineEventSink, period: Duration) {
    events.emit(EngineEvent::ItemStatus(ItemStatus::ReadyToPlay));
    if let Some(duration) = item.duration() {
        events.emit(EngineEvent::BufferedRange(duration));
    }

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await;

    loop {
        interval.tick().await;

        let (position, finished) = {
            let mut clock = clock.lock();
            if clock.rate <= 0.0 || clock.ended {
                continue;
            }
            let rate = clock.rate;
            clock.position += period.mul_f32(rate);
            let finished = item.duration().is_some_and(|d| clock.position >= d);
            if let (true, Some(duration)) = (finished, item.duration()) {
                clock.position = duration;
                clock.ended = true;
            }
            (clock.position, finished)
        };

        let mut open = events.emit(EngineEvent::Time(position));
        if finished {
            open = events.emit(EngineEvent::EndOfTrack);
        }
        if !open {
            break;
        }
    }
}

struct SimulatedInstance {
    clock: SharedClock,
    ticker: JoinHandle<()>,
}

impl EngineInstance for SimulatedInstance {
    fn play(&mut self, rate: f32) {
        self.clock.lock().rate = rate;
    }

    fn pause(&mut self) {
        self.clock.lock().rate = 0.0;
    }

    fn seek(&mut self, position: Duration) {
        let mut clock = self.clock.lock();
        clock.position = position;
        clock.ended = false;
    }

    fn set_rate(&mut self, rate: f32) {
        self.clock.lock().rate = rate;
    }

    fn rate(&self) -> f32 {
        self.clock.lock().rate
    }

    fn current_time(&self) -> Option<Duration> {
        Some(self.clock.lock().position)
    }
}

impl Drop for SimulatedInstance {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aria_playback::{EngineEnvelope, InstanceId, ItemMetadata};
    use tokio::sync::mpsc;

    fn item(secs: u64) -> MediaItem {
        MediaItem::new(
            "/music/silence.mp3",
            ItemMetadata {
                duration: Some(Duration::from_secs(secs)),
                ..ItemMetadata::default()
            },
        )
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<EngineEnvelope>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            events.push(envelope.event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn plays_to_the_end() {
        let engine = SimulatedEngine::new(Duration::from_millis(250));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EngineEventSink::new(InstanceId(1), tx);
        let mut instance = engine
            .create_instance(&item(1), InstanceOptions::default(), sink)
            .unwrap();
        instance.play(1.0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        let events = drain(&mut rx);

        assert_eq!(
            events.first(),
            Some(&EngineEvent::ItemStatus(ItemStatus::ReadyToPlay))
        );
        assert!(events.contains(&EngineEvent::Time(Duration::from_millis(500))));
        assert_eq!(
            events.iter().filter(|e| **e == EngineEvent::EndOfTrack).count(),
            1
        );
        assert_eq!(instance.current_time(), Some(Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn paused_clock_does_not_move() {
        let engine = SimulatedEngine::new(Duration::from_millis(100));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EngineEventSink::new(InstanceId(1), tx);
        let mut instance = engine
            .create_instance(&item(60), InstanceOptions::default(), sink)
            .unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(instance.current_time(), Some(Duration::ZERO));

        instance.play(2.0);
        tokio::time::sleep(Duration::from_millis(1050)).await;
        instance.pause();
        let reached = instance.current_time().unwrap();
        assert!(reached >= Duration::from_millis(1900));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(instance.current_time(), Some(reached));
        assert!(!drain(&mut rx).contains(&EngineEvent::EndOfTrack));
    }

    #[tokio::test]
    async fn load_requires_an_existing_file() {
        let engine = SimulatedEngine::new(Duration::from_millis(250));
        assert!(engine.load(&item(1)).await.is_err());

        let file = tempfile::NamedTempFile::new().unwrap();
        let present = MediaItem::new(
            file.path().display().to_string(),
            ItemMetadata::default(),
        );
        assert!(engine.load(&present).await.is_ok());
    }
}

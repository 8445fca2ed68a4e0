//! Shared test doubles: a scripted media engine and recording OS adapters

#![allow(dead_code)]

use aria_playback::{
    EngineEvent, EngineEventSink, EngineInstance, InstanceId, InstanceOptions, ItemMetadata,
    ItemStatus, MediaEngine, MediaItem, NowPlayingCenter, NowPlayingInfo, PlaybackError,
    RemoteButton, RemoteCommandCenter, Result,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn song(name: &str, secs: u64) -> MediaItem {
    MediaItem::new(
        format!("/music/{name}.mp3"),
        ItemMetadata {
            title: Some(name.to_string()),
            artist: Some("Test Artist".to_string()),
            duration: Some(Duration::from_secs(secs)),
            ..ItemMetadata::default()
        },
    )
}

pub fn songs(names: &[&str]) -> Vec<MediaItem> {
    names.iter().map(|name| song(name, 30)).collect()
}

/// Engine side of one instance, as seen by the test
#[derive(Clone)]
pub struct InstanceProbe {
    pub id: InstanceId,
    pub locator: String,
    pub options: InstanceOptions,
    sink: EngineEventSink,
    calls: Arc<Mutex<Vec<String>>>,
    rate: Arc<Mutex<f32>>,
}

impl InstanceProbe {
    pub fn emit(&self, event: EngineEvent) {
        self.sink.emit(event);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn rate(&self) -> f32 {
        *self.rate.lock().unwrap()
    }
}

struct FakeInstance {
    calls: Arc<Mutex<Vec<String>>>,
    rate: Arc<Mutex<f32>>,
    position: Duration,
    /// Rate stays at zero after play (engine cannot recover from a stall)
    stuck: bool,
}

impl EngineInstance for FakeInstance {
    fn play(&mut self, rate: f32) {
        self.calls.lock().unwrap().push(format!("play {rate}"));
        *self.rate.lock().unwrap() = if self.stuck { 0.0 } else { rate };
    }

    fn pause(&mut self) {
        self.calls.lock().unwrap().push("pause".to_string());
        *self.rate.lock().unwrap() = 0.0;
    }

    fn seek(&mut self, position: Duration) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("seek {}", position.as_secs()));
        self.position = position;
    }

    fn set_rate(&mut self, rate: f32) {
        self.calls.lock().unwrap().push(format!("rate {rate}"));
        *self.rate.lock().unwrap() = rate;
    }

    fn rate(&self) -> f32 {
        *self.rate.lock().unwrap()
    }

    fn current_time(&self) -> Option<Duration> {
        Some(self.position)
    }
}

#[derive(Default)]
struct EngineState {
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    hanging: HashSet<String>,
    stuck: bool,
    refuse_instances: bool,
    loads: Vec<String>,
    instances: Vec<InstanceProbe>,
}

/// Scripted engine
///
/// Loads succeed immediately unless scripted otherwise. With `auto_ready`,
/// each new instance reports its item ready to play right away.
#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<EngineState>,
    auto_ready: bool,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auto_ready() -> Self {
        Self {
            auto_ready: true,
            ..Self::default()
        }
    }

    pub fn fail_loads_of(&self, item: &MediaItem) {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(item.locator().to_string());
    }

    pub fn delay_loads_of(&self, item: &MediaItem, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .delays
            .insert(item.locator().to_string(), delay);
    }

    pub fn hang_loads_of(&self, item: &MediaItem) {
        self.state
            .lock()
            .unwrap()
            .hanging
            .insert(item.locator().to_string());
    }

    pub fn make_stuck(&self) {
        self.state.lock().unwrap().stuck = true;
    }

    pub fn refuse_instances(&self) {
        self.state.lock().unwrap().refuse_instances = true;
    }

    pub fn loads(&self) -> Vec<String> {
        self.state.lock().unwrap().loads.clone()
    }

    pub fn instances(&self) -> Vec<InstanceProbe> {
        self.state.lock().unwrap().instances.clone()
    }

    pub fn last_instance(&self) -> InstanceProbe {
        self.instances()
            .pop()
            .expect("no engine instance was created")
    }

    /// Synchronous load outcome, for driving the controller by hand
    pub fn load_result(&self, item: &MediaItem) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.loads.push(item.locator().to_string());
        if state.failing.contains(item.locator()) {
            Err(PlaybackError::ItemLoadFailed(format!(
                "cannot open {}",
                item.locator()
            )))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MediaEngine for FakeEngine {
    async fn load(&self, item: &MediaItem) -> Result<()> {
        let (delay, hang) = {
            let state = self.state.lock().unwrap();
            (
                state.delays.get(item.locator()).copied(),
                state.hanging.contains(item.locator()),
            )
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.load_result(item)
    }

    fn create_instance(
        &self,
        item: &MediaItem,
        options: InstanceOptions,
        events: EngineEventSink,
    ) -> Result<Box<dyn EngineInstance>> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_instances {
            return Err(PlaybackError::EngineUnavailable);
        }
        let calls = Arc::new(Mutex::new(Vec::new()));
        let rate = Arc::new(Mutex::new(0.0));
        let probe = InstanceProbe {
            id: events.instance(),
            locator: item.locator().to_string(),
            options,
            sink: events.clone(),
            calls: calls.clone(),
            rate: rate.clone(),
        };
        state.instances.push(probe);

        if self.auto_ready {
            events.emit(EngineEvent::ItemStatus(ItemStatus::ReadyToPlay));
        }

        Ok(Box::new(FakeInstance {
            calls,
            rate,
            position: Duration::ZERO,
            stuck: state.stuck,
        }))
    }
}

/// Now-playing surface that records what it was told
#[derive(Clone, Default)]
pub struct RecordingNowPlaying {
    pub published: Arc<Mutex<Vec<NowPlayingInfo>>>,
    pub cleared: Arc<Mutex<usize>>,
}

impl NowPlayingCenter for RecordingNowPlaying {
    fn publish(&mut self, info: &NowPlayingInfo) {
        self.published.lock().unwrap().push(info.clone());
    }

    fn clear(&mut self) {
        *self.cleared.lock().unwrap() += 1;
    }
}

/// Remote registry that tracks registered buttons and their enablement
#[derive(Clone, Default)]
pub struct RecordingRemote {
    pub registered: Arc<Mutex<HashMap<RemoteButton, Option<u32>>>>,
    pub enabled: Arc<Mutex<HashMap<RemoteButton, bool>>>,
}

impl RecordingRemote {
    pub fn is_registered(&self, button: RemoteButton) -> bool {
        self.registered.lock().unwrap().contains_key(&button)
    }

    pub fn interval(&self, button: RemoteButton) -> Option<u32> {
        self.registered.lock().unwrap().get(&button).copied().flatten()
    }

    pub fn is_enabled(&self, button: RemoteButton) -> bool {
        self.enabled
            .lock()
            .unwrap()
            .get(&button)
            .copied()
            .unwrap_or(false)
    }
}

impl RemoteCommandCenter for RecordingRemote {
    fn register(&mut self, button: RemoteButton, preferred_interval: Option<u32>) {
        self.registered
            .lock()
            .unwrap()
            .insert(button, preferred_interval);
    }

    fn unregister(&mut self, button: RemoteButton) {
        self.registered.lock().unwrap().remove(&button);
        self.enabled.lock().unwrap().remove(&button);
    }

    fn set_enabled(&mut self, button: RemoteButton, enabled: bool) {
        self.enabled.lock().unwrap().insert(button, enabled);
    }
}

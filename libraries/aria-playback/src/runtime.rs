//! Async runtime driver
//!
//! Runs a [`PlaybackController`] on a tokio task and merges every producer
//! into one loop:
//! - Requests from [`PlayerHandle`]s (user commands, queue and mode changes)
//! - Auto commands the controller issues itself
//! - Engine events, session events and remote button presses
//! - Completions of load and prefetch tasks
//! - Metadata changes of the current item
//!
//! After each turn the pending controller events are pushed to the
//! now-playing surface, the remote button registry, the status and
//! snapshot watches and the event broadcast.

use crate::adapter::{
    NowPlayingCenter, RemoteButtons, RemoteCommandCenter, RemoteEvent, SessionEvent,
};
use crate::command::{Command, CommandOrigin};
use crate::controller::{Effect, PlaybackController, PlayerSnapshot};
use crate::engine::{EngineEnvelope, MediaEngine};
use crate::error::{PlaybackError, Result};
use crate::events::PlaybackEvent;
use crate::item::{ItemMetadata, MediaItem};
use crate::types::{PlayerConfig, PlayerStatus, RemoteControlMode, RepeatMode, ShuffleMode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

type Job = Box<dyn FnOnce(&mut PlaybackController) -> Vec<Effect> + Send>;

enum Request {
    Apply(Job),
    Shutdown(oneshot::Sender<()>),
}

enum Completion {
    Load {
        generation: u64,
        item: MediaItem,
        result: Result<()>,
    },
    Prefetch {
        generation: u64,
        item: MediaItem,
        result: Result<()>,
    },
}

/// OS-facing collaborators of the runtime
pub struct PlayerAdapters {
    pub now_playing: Box<dyn NowPlayingCenter>,
    pub remote: Box<dyn RemoteCommandCenter>,
    pub session_events: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    pub remote_events: Option<mpsc::UnboundedReceiver<RemoteEvent>>,
}

impl PlayerAdapters {
    pub fn new(now_playing: Box<dyn NowPlayingCenter>, remote: Box<dyn RemoteCommandCenter>) -> Self {
        Self {
            now_playing,
            remote,
            session_events: None,
            remote_events: None,
        }
    }

    pub fn with_session_events(mut self, events: mpsc::UnboundedReceiver<SessionEvent>) -> Self {
        self.session_events = Some(events);
        self
    }

    pub fn with_remote_events(mut self, events: mpsc::UnboundedReceiver<RemoteEvent>) -> Self {
        self.remote_events = Some(events);
        self
    }
}

/// Entry point for running a player
pub struct PlayerRuntime;

impl PlayerRuntime {
    /// Spawn the controller task on the current tokio runtime
    pub fn spawn(
        config: PlayerConfig,
        engine: Arc<dyn MediaEngine>,
        adapters: PlayerAdapters,
    ) -> Result<PlayerHandle> {
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let load_timeout = config.load_timeout();
        let event_capacity = config.event_capacity;
        let controller = PlaybackController::new(config, engine.clone(), engine_tx)?;

        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (auto_tx, auto_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(event_capacity);
        let (status_tx, status_rx) = watch::channel(controller.status().clone());
        let (snapshot_tx, snapshot_rx) = watch::channel(controller.snapshot());

        let PlayerAdapters {
            now_playing,
            remote,
            session_events,
            remote_events,
        } = adapters;

        let driver = Driver {
            controller,
            engine,
            load_timeout,
            now_playing,
            remote,
            buttons: RemoteButtons::new(),
            auto_tx,
            completion_tx,
            in_flight: None,
            events_tx: events_tx.clone(),
            status_tx,
            snapshot_tx,
        };

        tokio::spawn(driver.run(Inputs {
            requests: request_rx,
            auto: auto_rx,
            engine: engine_rx,
            completions: completion_rx,
            session: session_events,
            remote: remote_events,
        }));

        Ok(PlayerHandle {
            requests: request_tx,
            status: status_rx,
            snapshot: snapshot_rx,
            events: events_tx,
        })
    }
}

/// Cloneable handle to a running player
#[derive(Clone)]
pub struct PlayerHandle {
    requests: mpsc::UnboundedSender<Request>,
    status: watch::Receiver<PlayerStatus>,
    snapshot: watch::Receiver<PlayerSnapshot>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl PlayerHandle {
    /// Run `f` on the controller inside the player task
    ///
    /// Effects returned by `f` are carried out by the runtime; the value is
    /// handed back to the caller.
    pub async fn apply<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PlaybackController) -> Result<(T, Vec<Effect>)> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |controller: &mut PlaybackController| match f(controller) {
            Ok((value, effects)) => {
                let _ = reply_tx.send(Ok(value));
                effects
            }
            Err(e) => {
                let _ = reply_tx.send(Err(e));
                Vec::new()
            }
        });
        self.requests
            .send(Request::Apply(job))
            .map_err(|_| PlaybackError::ControllerClosed)?;
        reply_rx
            .await
            .map_err(|_| PlaybackError::ControllerClosed)?
    }

    /// Send a user command
    pub async fn send(&self, command: Command) -> Result<()> {
        self.send_from(command, CommandOrigin::User).await
    }

    pub async fn send_from(&self, command: Command, origin: CommandOrigin) -> Result<()> {
        self.apply(move |c| c.execute(command, origin).map(|effects| ((), effects)))
            .await
    }

    pub async fn new_songs(&self, items: Vec<MediaItem>) -> Result<()> {
        self.apply(move |c| {
            c.new_songs(items);
            Ok(((), Vec::new()))
        })
        .await
    }

    pub async fn append(&self, items: Vec<MediaItem>) -> Result<()> {
        self.apply(move |c| {
            c.append(items);
            Ok(((), Vec::new()))
        })
        .await
    }

    pub async fn insert(&self, item: MediaItem, at: usize) -> Result<()> {
        self.apply(move |c| c.insert(item, at).map(|()| ((), Vec::new())))
            .await
    }

    pub async fn remove(&self, at: usize) -> Result<MediaItem> {
        self.apply(move |c| c.remove(at).map(|item| (item, Vec::new())))
            .await
    }

    pub async fn front_queue(&self, items: Vec<MediaItem>) -> Result<()> {
        self.apply(move |c| c.front_queue(items).map(|()| ((), Vec::new())))
            .await
    }

    pub async fn remove_item(&self, locator: impl Into<String>) -> Result<usize> {
        let locator = locator.into();
        self.apply(move |c| Ok((c.remove_item(&locator), Vec::new())))
            .await
    }

    pub async fn set_shuffle(&self, mode: ShuffleMode) -> Result<()> {
        self.apply(move |c| {
            c.set_shuffle(mode);
            Ok(((), Vec::new()))
        })
        .await
    }

    pub async fn toggle_shuffle(&self) -> Result<()> {
        self.apply(|c| {
            c.toggle_shuffle();
            Ok(((), Vec::new()))
        })
        .await
    }

    pub async fn set_repeat(&self, mode: RepeatMode) -> Result<()> {
        self.apply(move |c| {
            c.set_repeat(mode);
            Ok(((), Vec::new()))
        })
        .await
    }

    pub async fn cycle_repeat(&self) -> Result<()> {
        self.apply(|c| {
            c.cycle_repeat();
            Ok(((), Vec::new()))
        })
        .await
    }

    pub async fn set_remote_control(&self, mode: RemoteControlMode) -> Result<()> {
        self.apply(move |c| {
            c.set_remote_control(mode);
            Ok(((), Vec::new()))
        })
        .await
    }

    pub async fn toggle_remote_control(&self, interval: u32) -> Result<()> {
        self.apply(move |c| {
            c.toggle_remote_control(interval);
            Ok(((), Vec::new()))
        })
        .await
    }

    pub async fn set_desired_rate(&self, rate: f32) -> Result<()> {
        self.apply(move |c| c.set_desired_rate(rate).map(|()| ((), Vec::new())))
            .await
    }

    pub async fn play_pause(&self) -> Result<()> {
        self.apply(|c| c.play_pause(CommandOrigin::User).map(|e| ((), e)))
            .await
    }

    pub async fn play_next_wrapping(&self) -> Result<()> {
        self.apply(|c| c.play_next_wrapping(CommandOrigin::User).map(|e| ((), e)))
            .await
    }

    /// Latest published state
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch the player status (de-duplicated)
    pub fn status(&self) -> watch::Receiver<PlayerStatus> {
        self.status.clone()
    }

    /// Watch the full snapshot
    pub fn watch_snapshot(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshot.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Stop playback, clear the now-playing surface and end the task
    pub async fn shutdown(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send(Request::Shutdown(reply_tx))
            .map_err(|_| PlaybackError::ControllerClosed)?;
        reply_rx.await.map_err(|_| PlaybackError::ControllerClosed)
    }
}

struct Inputs {
    requests: mpsc::UnboundedReceiver<Request>,
    auto: mpsc::UnboundedReceiver<(u64, Command)>,
    engine: mpsc::UnboundedReceiver<EngineEnvelope>,
    completions: mpsc::UnboundedReceiver<Completion>,
    session: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    remote: Option<mpsc::UnboundedReceiver<RemoteEvent>>,
}

struct Driver {
    controller: PlaybackController,
    engine: Arc<dyn MediaEngine>,
    load_timeout: Option<Duration>,
    now_playing: Box<dyn NowPlayingCenter>,
    remote: Box<dyn RemoteCommandCenter>,
    buttons: RemoteButtons,
    auto_tx: mpsc::UnboundedSender<(u64, Command)>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    /// Load or prefetch of the latest accepted command
    in_flight: Option<JoinHandle<()>>,
    events_tx: broadcast::Sender<PlaybackEvent>,
    status_tx: watch::Sender<PlayerStatus>,
    snapshot_tx: watch::Sender<PlayerSnapshot>,
}

async fn recv_or_pending<T>(rx: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn changed_or_pending(rx: &mut Option<watch::Receiver<ItemMetadata>>) -> bool {
    match rx {
        Some(rx) => rx.changed().await.is_ok(),
        None => std::future::pending().await,
    }
}

impl Driver {
    async fn run(mut self, mut inputs: Inputs) {
        info!("Playback controller started");
        self.publish();

        let mut watched: Option<MediaItem> = None;
        let mut metadata: Option<watch::Receiver<ItemMetadata>> = None;

        loop {
            tokio::select! {
                request = inputs.requests.recv() => match request {
                    Some(Request::Apply(job)) => {
                        let effects = job(&mut self.controller);
                        self.run_effects(effects);
                    }
                    Some(Request::Shutdown(reply)) => {
                        self.shutdown();
                        let _ = reply.send(());
                        break;
                    }
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                Some((generation, command)) = inputs.auto.recv() => {
                    match self.controller.execute_issued(generation, command) {
                        Ok(effects) => self.run_effects(effects),
                        Err(e) => debug!("Auto command dropped: {}", e),
                    }
                }
                Some(envelope) = inputs.engine.recv() => {
                    let effects = self.controller.handle_engine_event(envelope);
                    self.run_effects(effects);
                }
                Some(completion) = inputs.completions.recv() => {
                    self.complete(completion);
                }
                event = recv_or_pending(&mut inputs.session) => match event {
                    Some(event) => {
                        let effects = self.controller.handle_session_event(event);
                        self.run_effects(effects);
                    }
                    None => inputs.session = None,
                },
                event = recv_or_pending(&mut inputs.remote) => match event {
                    Some(event) => match self.controller.handle_remote_event(event) {
                        Ok(effects) => self.run_effects(effects),
                        Err(e) => debug!("Remote {:?} rejected: {}", event, e),
                    },
                    None => inputs.remote = None,
                },
                changed = changed_or_pending(&mut metadata) => {
                    if changed {
                        self.controller.refresh();
                    } else {
                        metadata = None;
                    }
                }
            }

            self.publish();

            // Follow metadata of whatever is current now
            let current = self.controller.current_item().cloned();
            let same = match (&watched, &current) {
                (Some(a), Some(b)) => a.same_entry(b),
                (None, None) => true,
                _ => false,
            };
            if !same {
                metadata = current.as_ref().map(MediaItem::subscribe);
                watched = current;
            }
        }

        info!("Playback controller stopped");
    }

    fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Load {
                    generation, item, ..
                } => {
                    let load = self.bounded_load(item.clone());
                    let completions = self.completion_tx.clone();
                    self.replace_in_flight(tokio::spawn(async move {
                        let result = load.await;
                        let _ = completions.send(Completion::Load {
                            generation,
                            item,
                            result,
                        });
                    }));
                }
                Effect::Prefetch { generation, item } => {
                    let load = self.bounded_load(item.clone());
                    let completions = self.completion_tx.clone();
                    self.replace_in_flight(tokio::spawn(async move {
                        let result = load.await;
                        let _ = completions.send(Completion::Prefetch {
                            generation,
                            item,
                            result,
                        });
                    }));
                }
                Effect::Preload(items) => {
                    for item in items {
                        let engine = self.engine.clone();
                        tokio::spawn(async move {
                            if let Err(e) = engine.load(&item).await {
                                debug!("Preload of {} failed: {}", item.locator(), e);
                            }
                        });
                    }
                }
                Effect::Issue {
                    generation,
                    command,
                } => {
                    let _ = self.auto_tx.send((generation, command));
                }
            }
        }
    }

    /// Engine load bounded by the configured timeout
    fn bounded_load(&self, item: MediaItem) -> impl std::future::Future<Output = Result<()>> {
        let engine = self.engine.clone();
        let timeout = self.load_timeout;
        async move {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, engine.load(&item))
                    .await
                    .unwrap_or(Err(PlaybackError::LoadTimedOut(limit))),
                None => engine.load(&item).await,
            }
        }
    }

    fn replace_in_flight(&mut self, task: JoinHandle<()>) {
        if let Some(previous) = self.in_flight.replace(task) {
            previous.abort();
        }
    }

    fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::Load {
                generation,
                item,
                result,
            } => {
                let effects = self.controller.complete_load(generation, &item, result);
                self.run_effects(effects);
            }
            Completion::Prefetch {
                generation,
                item,
                result,
            } => {
                self.controller.complete_prefetch(generation, &item, result);
            }
        }
    }

    fn publish(&mut self) {
        let events = self.controller.drain_events();

        for event in &events {
            if let PlaybackEvent::NowPlayingChanged { info } = event {
                match info {
                    Some(info) => self.now_playing.publish(info),
                    None => self.now_playing.clear(),
                }
            }
        }
        self.buttons.sync(
            self.remote.as_mut(),
            self.controller.remote_control(),
            &self.controller.capabilities(),
        );

        let status = self.controller.status().clone();
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });

        if !events.is_empty() {
            self.snapshot_tx.send_replace(self.controller.snapshot());
        }
        for event in events {
            // No subscribers is fine
            let _ = self.events_tx.send(event);
        }
    }

    fn shutdown(&mut self) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
        self.controller.shutdown();
        self.now_playing.clear();
        self.buttons.teardown(self.remote.as_mut());
        self.snapshot_tx.send_replace(self.controller.snapshot());
        let status = self.controller.status().clone();
        self.status_tx.send_replace(status);
    }
}
